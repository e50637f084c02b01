//! Screen-level controller: one record collection backed by one store.

use std::sync::Arc;

use shared::record::Record;
use tracing::{info, warn};

use crate::{
    coordinator::MutationCoordinator, error::MutationError, store::RecordStore,
    types::CoordinatorOptions,
};

pub struct RecordController<R: Record> {
    coordinator: MutationCoordinator<R>,
    store: Arc<dyn RecordStore<R>>,
}

impl<R: Record> RecordController<R> {
    pub fn new(store: Arc<dyn RecordStore<R>>) -> Self {
        Self::with_options(store, CoordinatorOptions::default())
    }

    pub fn with_options(store: Arc<dyn RecordStore<R>>, options: CoordinatorOptions) -> Self {
        Self {
            coordinator: MutationCoordinator::with_options(options),
            store,
        }
    }

    pub fn coordinator(&self) -> &MutationCoordinator<R> {
        &self.coordinator
    }

    /// Replaces the collection with the store's current contents.
    pub async fn load(&self) -> bool {
        self.coordinator.set_loading(true);
        let loaded = match self.store.list().await {
            Ok(items) => {
                info!(
                    collection = R::COLLECTION,
                    count = items.len(),
                    "controller: collection loaded"
                );
                self.coordinator.set_collection(items);
                true
            }
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(
                    collection = R::COLLECTION,
                    error = %reason,
                    "controller: collection load failed"
                );
                self.coordinator.set_error(Some(MutationError::Load {
                    collection: R::COLLECTION.to_string(),
                    reason,
                }));
                false
            }
        };
        self.coordinator.set_loading(false);
        loaded
    }

    pub async fn create(&self, candidate: R) -> Option<R::Key> {
        let store = Arc::clone(&self.store);
        let record = candidate.clone();
        self.coordinator
            .optimistic_add(candidate, move || async move { store.insert(record).await })
            .await
    }

    pub async fn update(&self, key: R::Key, patch: R::Patch) -> bool {
        let store = Arc::clone(&self.store);
        let target = key.clone();
        let change = patch.clone();
        self.coordinator
            .optimistic_update(key, patch, move || async move {
                store.update(target, change).await
            })
            .await
    }

    pub async fn remove(&self, key: R::Key) -> bool {
        let store = Arc::clone(&self.store);
        let target = key.clone();
        self.coordinator
            .optimistic_delete(key, move || async move { store.delete(target).await })
            .await
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
