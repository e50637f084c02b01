use serde_json::json;
use storage::Storage;

#[tokio::test]
async fn documents_survive_reopening_the_database_file() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("records.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let id = {
        let storage = Storage::new(&database_url).await.expect("first open");
        let id = storage
            .insert_document(
                "partner_balances",
                json!({ "partner_name": "Keel & Co", "balance_cents": 420_000 }),
            )
            .await
            .expect("insert");
        storage.pool().close().await;
        id
    };

    let reopened = Storage::new(&database_url).await.expect("second open");
    let documents = reopened
        .list_documents("partner_balances")
        .await
        .expect("list");
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].id, id);
    assert_eq!(documents[0].body["balance_cents"], json!(420_000));
}
