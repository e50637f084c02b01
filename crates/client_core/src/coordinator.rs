//! Optimistic mutations over an in-memory record collection.
//!
//! Every operation changes local state before its returned future is first
//! polled, then awaits the caller's commit. On success the change is kept
//! (an added record also takes the committed key); on failure only what the
//! operation itself changed is undone, from the undo record captured when it
//! started. Operations never retry or time out on their own; dropping an
//! operation's future before it settles rolls its change back the same way a
//! rejected commit does.

use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
};

use shared::record::{Record, RecordKey};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

use crate::{
    error::MutationError,
    ledger::PendingLedger,
    temp_key::temporary_key,
    types::{CoordinatorOptions, MutationEvent, MutationKind, OperationId},
};

/// Observable state of a coordinator.
pub struct CollectionState<R: Record> {
    items: Vec<R>,
    loading: bool,
    error: Option<MutationError>,
    pending: PendingLedger<R::Key>,
}

impl<R: Record> Default for CollectionState<R> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
            pending: PendingLedger::default(),
        }
    }
}

impl<R: Record> Clone for CollectionState<R> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            loading: self.loading,
            error: self.error.clone(),
            pending: self.pending.clone(),
        }
    }
}

impl<R: Record> CollectionState<R> {
    pub fn items(&self) -> &[R] {
        &self.items
    }

    pub fn get(&self, key: &R::Key) -> Option<&R> {
        self.items.iter().find(|item| item.key() == key)
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&MutationError> {
        self.error.as_ref()
    }

    pub fn is_pending(&self, key: &R::Key) -> bool {
        self.pending.contains(key)
    }

    pub fn pending_kind(&self, key: &R::Key) -> Option<MutationKind> {
        self.pending.kind(key)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn position(&self, key: &R::Key) -> Option<usize> {
        self.items.iter().position(|item| item.key() == key)
    }
}

/// What one operation needs to revert its own change.
enum Undo<R> {
    DiscardAdded,
    Restore(R),
    Reinsert { index: usize, record: R },
}

impl<R: Record> Undo<R> {
    fn apply(self, state: &mut CollectionState<R>, key: &R::Key) {
        match self {
            Undo::DiscardAdded => state.items.retain(|item| item.key() != key),
            Undo::Restore(previous) => {
                if let Some(index) = state.position(key) {
                    state.items[index] = previous;
                }
            }
            Undo::Reinsert { index, record } => {
                if state.position(key).is_none() {
                    let index = index.min(state.items.len());
                    state.items.insert(index, record);
                }
            }
        }
    }
}

pub struct MutationCoordinator<R: Record> {
    state: watch::Sender<CollectionState<R>>,
    events: broadcast::Sender<MutationEvent<R::Key>>,
    next_operation: AtomicU64,
}

impl<R: Record> Default for MutationCoordinator<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> MutationCoordinator<R> {
    pub fn new() -> Self {
        Self::with_options(CoordinatorOptions::default())
    }

    pub fn with_options(options: CoordinatorOptions) -> Self {
        let (state, _) = watch::channel(CollectionState::default());
        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        Self {
            state,
            events,
            next_operation: AtomicU64::new(1),
        }
    }

    /// Replaces the collection wholesale and clears the last error. In-flight
    /// operations keep their ledger entries.
    pub fn set_collection(&self, items: Vec<R>) {
        let count = items.len();
        self.state.send_modify(|state| {
            state.items = items;
            state.error = None;
        });
        debug!(collection = R::COLLECTION, count, "optimistic: collection replaced");
    }

    pub fn set_loading(&self, loading: bool) {
        self.state.send_modify(|state| state.loading = loading);
    }

    pub fn set_error(&self, error: Option<MutationError>) {
        self.state.send_modify(|state| state.error = error);
    }

    pub fn items(&self) -> Vec<R> {
        self.state.borrow().items.clone()
    }

    pub fn get(&self, key: &R::Key) -> Option<R> {
        self.state.borrow().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().items.is_empty()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn error(&self) -> Option<MutationError> {
        self.state.borrow().error.clone()
    }

    pub fn is_pending(&self, key: &R::Key) -> bool {
        self.state.borrow().is_pending(key)
    }

    pub fn pending_kind(&self, key: &R::Key) -> Option<MutationKind> {
        self.state.borrow().pending_kind(key)
    }

    pub fn snapshot(&self) -> CollectionState<R> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CollectionState<R>> {
        self.state.subscribe()
    }

    pub fn watch_stream(&self) -> WatchStream<CollectionState<R>> {
        WatchStream::new(self.state.subscribe())
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<MutationEvent<R::Key>> {
        self.events.subscribe()
    }

    /// Prepends `candidate` under a temporary key and commits it.
    ///
    /// Resolves to the committed key, or `None` once the candidate has been
    /// removed again because the commit failed.
    pub fn optimistic_add<'a, F, Fut>(
        &'a self,
        mut candidate: R,
        commit: F,
    ) -> impl Future<Output = Option<R::Key>> + Send + 'a
    where
        F: FnOnce() -> Fut + 'a,
        Fut: Future<Output = anyhow::Result<R::Key>> + Send + 'a,
    {
        let temporary = <R::Key as RecordKey>::from_temporary(temporary_key());
        candidate.set_key(temporary.clone());
        let operation = self.allocate_operation();

        self.state.send_modify(|state| {
            state.items.insert(0, candidate);
            state
                .pending
                .begin(temporary.clone(), operation, MutationKind::Add);
        });
        let in_flight = InFlight::new(
            self,
            temporary,
            operation,
            MutationKind::Add,
            Undo::DiscardAdded,
        );
        let pending = commit();

        async move {
            match pending.await {
                Ok(key) => {
                    in_flight.commit(Some(&key));
                    Some(key)
                }
                Err(err) => {
                    in_flight.reject(&err);
                    None
                }
            }
        }
    }

    /// Merges `patch` into the record under `key` and commits it.
    ///
    /// A missing key resolves to `false` without invoking `commit`. A failed
    /// commit restores only this record's previous value.
    pub fn optimistic_update<'a, F, Fut>(
        &'a self,
        key: R::Key,
        patch: R::Patch,
        commit: F,
    ) -> impl Future<Output = bool> + Send + 'a
    where
        F: FnOnce() -> Fut + 'a,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'a,
    {
        let mut started = None;
        self.state.send_modify(|state| {
            let Some(index) = state.position(&key) else {
                state.error = Some(MutationError::not_found(MutationKind::Update, &key));
                return;
            };
            let operation = self.allocate_operation();
            let previous = state.items[index].clone();
            state.items[index] = previous.patched(patch);
            state
                .pending
                .begin(key.clone(), operation, MutationKind::Update);
            started = Some((operation, previous));
        });

        let pending = match started {
            Some((operation, previous)) => {
                let in_flight = InFlight::new(
                    self,
                    key,
                    operation,
                    MutationKind::Update,
                    Undo::Restore(previous),
                );
                Some((in_flight, commit()))
            }
            None => {
                warn!(key = %key, "optimistic: update target not found");
                None
            }
        };

        async move {
            let Some((in_flight, pending)) = pending else {
                return false;
            };
            match pending.await {
                Ok(()) => {
                    in_flight.commit(None);
                    true
                }
                Err(err) => {
                    in_flight.reject(&err);
                    false
                }
            }
        }
    }

    /// Removes the record under `key` and commits the removal.
    ///
    /// A missing key resolves to `false` without invoking `commit`. A failed
    /// commit puts the record back at the index it was removed from.
    pub fn optimistic_delete<'a, F, Fut>(
        &'a self,
        key: R::Key,
        commit: F,
    ) -> impl Future<Output = bool> + Send + 'a
    where
        F: FnOnce() -> Fut + 'a,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'a,
    {
        let mut started = None;
        self.state.send_modify(|state| {
            let Some(index) = state.position(&key) else {
                state.error = Some(MutationError::not_found(MutationKind::Delete, &key));
                return;
            };
            let operation = self.allocate_operation();
            let record = state.items.remove(index);
            state
                .pending
                .begin(key.clone(), operation, MutationKind::Delete);
            started = Some((operation, Undo::Reinsert { index, record }));
        });

        let pending = match started {
            Some((operation, undo)) => {
                let in_flight = InFlight::new(self, key, operation, MutationKind::Delete, undo);
                Some((in_flight, commit()))
            }
            None => {
                warn!(key = %key, "optimistic: delete target not found");
                None
            }
        };

        async move {
            let Some((in_flight, pending)) = pending else {
                return false;
            };
            match pending.await {
                Ok(()) => {
                    in_flight.commit(None);
                    true
                }
                Err(err) => {
                    in_flight.reject(&err);
                    false
                }
            }
        }
    }

    fn allocate_operation(&self) -> OperationId {
        OperationId(self.next_operation.fetch_add(1, Ordering::Relaxed))
    }

    fn applied(&self, key: &R::Key, operation: OperationId, kind: MutationKind) {
        debug!(
            collection = R::COLLECTION,
            key = %key,
            kind = %kind,
            %operation,
            "optimistic: applied locally, commit started"
        );
        let _ = self.events.send(MutationEvent::Applied {
            key: key.clone(),
            kind,
        });
    }

    fn committed(
        &self,
        key: &R::Key,
        operation: OperationId,
        kind: MutationKind,
        reconcile_to: Option<&R::Key>,
    ) {
        let mut reconciled = false;
        self.state.send_modify(|state| {
            if let Some(committed_key) = reconcile_to {
                if let Some(item) = state.items.iter_mut().find(|item| item.key() == key) {
                    item.set_key(committed_key.clone());
                    reconciled = true;
                }
            }
            state.pending.settle(key, operation);
        });

        debug!(
            collection = R::COLLECTION,
            key = %key,
            kind = %kind,
            %operation,
            "optimistic: commit succeeded"
        );
        let _ = self.events.send(MutationEvent::Committed {
            key: key.clone(),
            kind,
        });

        if let Some(committed_key) = reconcile_to {
            if reconciled {
                let _ = self.events.send(MutationEvent::KeyReconciled {
                    temporary: key.clone(),
                    key: committed_key.clone(),
                });
            } else {
                debug!(
                    temporary = %key,
                    key = %committed_key,
                    "optimistic: added record left the collection before its commit settled"
                );
            }
        }
    }

    fn rolled_back(
        &self,
        key: &R::Key,
        operation: OperationId,
        kind: MutationKind,
        undo: Undo<R>,
        error: MutationError,
    ) {
        let recorded = error.clone();
        self.state.send_modify(|state| {
            undo.apply(state, key);
            state.pending.settle(key, operation);
            state.error = Some(recorded);
        });

        warn!(
            collection = R::COLLECTION,
            key = %key,
            kind = %kind,
            %operation,
            error = %error,
            "optimistic: local change rolled back"
        );
        let _ = self.events.send(MutationEvent::RolledBack {
            key: key.clone(),
            kind,
            error,
        });
    }
}

/// One applied operation whose commit has not settled yet.
///
/// Dropped unsettled, it rolls the change back and records
/// [`MutationError::Abandoned`].
struct InFlight<'a, R: Record> {
    coordinator: &'a MutationCoordinator<R>,
    key: R::Key,
    operation: OperationId,
    kind: MutationKind,
    undo: Option<Undo<R>>,
}

impl<'a, R: Record> InFlight<'a, R> {
    fn new(
        coordinator: &'a MutationCoordinator<R>,
        key: R::Key,
        operation: OperationId,
        kind: MutationKind,
        undo: Undo<R>,
    ) -> Self {
        coordinator.applied(&key, operation, kind);
        Self {
            coordinator,
            key,
            operation,
            kind,
            undo: Some(undo),
        }
    }

    fn commit(mut self, reconcile_to: Option<&R::Key>) {
        if self.undo.take().is_some() {
            self.coordinator
                .committed(&self.key, self.operation, self.kind, reconcile_to);
        }
    }

    fn reject(mut self, err: &anyhow::Error) {
        if let Some(undo) = self.undo.take() {
            let error = MutationError::commit_rejected(self.kind, &self.key, err);
            self.coordinator
                .rolled_back(&self.key, self.operation, self.kind, undo, error);
        }
    }
}

impl<R: Record> Drop for InFlight<'_, R> {
    fn drop(&mut self) {
        if let Some(undo) = self.undo.take() {
            let error = MutationError::abandoned(self.kind, &self.key);
            self.coordinator
                .rolled_back(&self.key, self.operation, self.kind, undo, error);
        }
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
