use anyhow::{Context, Result};
use async_trait::async_trait;
use shared::{domain::RecordId, error::BackendError, record::Record};
use storage::Storage;

use crate::store::RecordStore;

/// [`RecordStore`] over the SQLite document store, one collection per record type.
#[derive(Clone)]
pub struct DurableRecordStore {
    store: Storage,
}

impl DurableRecordStore {
    pub fn new(store: Storage) -> Self {
        Self { store }
    }

    pub async fn open(database_url: &str) -> Result<Self> {
        let store = Storage::new(database_url)
            .await
            .with_context(|| format!("failed to open document store at '{database_url}'"))?;
        Ok(Self::new(store))
    }

    pub fn storage(&self) -> &Storage {
        &self.store
    }
}

#[async_trait]
impl<R> RecordStore<R> for DurableRecordStore
where
    R: Record<Key = RecordId>,
{
    async fn list(&self) -> Result<Vec<R>> {
        self.store
            .list_documents(R::COLLECTION)
            .await?
            .into_iter()
            .map(|document| {
                serde_json::from_value(document.body).with_context(|| {
                    format!(
                        "document {} in {} does not match the record shape",
                        document.id,
                        R::COLLECTION
                    )
                })
            })
            .collect()
    }

    async fn insert(&self, record: R) -> Result<RecordId> {
        let body = serde_json::to_value(&record)
            .with_context(|| format!("failed to encode {} record", R::COLLECTION))?;
        self.store.insert_document(R::COLLECTION, body).await
    }

    async fn update(&self, key: RecordId, patch: R::Patch) -> Result<()> {
        let document = self
            .store
            .get_document(R::COLLECTION, &key)
            .await?
            .ok_or_else(|| BackendError::not_found(R::COLLECTION, key.as_str()))?;
        let mut record: R = serde_json::from_value(document.body).with_context(|| {
            format!(
                "document {key} in {} does not match the record shape",
                R::COLLECTION
            )
        })?;
        record.apply_patch(patch);
        let body = serde_json::to_value(&record)
            .with_context(|| format!("failed to encode {} record", R::COLLECTION))?;
        self.store.replace_document(R::COLLECTION, &key, body).await
    }

    async fn delete(&self, key: RecordId) -> Result<()> {
        self.store.delete_document(R::COLLECTION, &key).await
    }
}
