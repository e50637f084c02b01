use std::sync::Arc;

use client_core::{DurableRecordStore, MutationError, MutationKind, RecordController};
use shared::{
    domain::{RecordId, Vessel, WorkItem, WorkItemPatch, WorkItemStatus},
    record::Record,
};

async fn open_store() -> Arc<DurableRecordStore> {
    Arc::new(
        DurableRecordStore::open("sqlite::memory:")
            .await
            .expect("document store"),
    )
}

fn spool_item(title: &str) -> WorkItem {
    WorkItem::planned(
        RecordId::from("vessel-1"),
        RecordId::from("project-7"),
        RecordId::from("dept-piping"),
        title,
    )
}

#[tokio::test]
async fn work_items_flow_through_the_document_store() {
    let store = open_store().await;
    let controller: RecordController<WorkItem> = RecordController::new(store.clone());
    assert!(controller.load().await);
    assert!(controller.coordinator().is_empty());

    let first = controller
        .create(spool_item("fabricate spool 12"))
        .await
        .expect("first item");
    let second = controller
        .create(spool_item("pressure test spool 12"))
        .await
        .expect("second item");

    let local: Vec<RecordId> = controller
        .coordinator()
        .items()
        .iter()
        .map(|item| item.key().clone())
        .collect();
    assert_eq!(local, vec![second.clone(), first.clone()]);

    assert!(
        controller
            .update(first.clone(), WorkItemPatch::completed())
            .await
    );
    assert!(controller.remove(second.clone()).await);

    let reloaded: RecordController<WorkItem> = RecordController::new(store.clone());
    assert!(reloaded.load().await);
    let items = reloaded.coordinator().items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, first);
    assert_eq!(items[0].status, WorkItemStatus::Done);
    assert_eq!(items[0].progress_percent, 100);
}

#[tokio::test]
async fn update_of_externally_deleted_document_rolls_back() {
    let store = open_store().await;
    let controller: RecordController<Vessel> = RecordController::new(store.clone());
    let id = controller
        .create(Vessel {
            id: RecordId::default(),
            name: "Aurora".to_string(),
            hull_number: None,
        })
        .await
        .expect("vessel");

    store
        .storage()
        .delete_document(Vessel::COLLECTION, &id)
        .await
        .expect("external delete");

    let renamed = controller
        .update(
            id.clone(),
            shared::domain::VesselPatch {
                name: Some("Aurora II".to_string()),
                ..Default::default()
            },
        )
        .await;

    assert!(!renamed);
    let local = controller.coordinator().get(&id).expect("still listed locally");
    assert_eq!(local.name, "Aurora");
    match controller.coordinator().error() {
        Some(MutationError::CommitRejected { kind, reason, .. }) => {
            assert_eq!(kind, MutationKind::Update);
            assert!(reason.contains("not found"));
        }
        other => panic!("unexpected error state: {other:?}"),
    }
}
