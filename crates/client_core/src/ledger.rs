use std::{collections::HashMap, hash::Hash};

use crate::types::{MutationKind, OperationId};

/// Keys with an unresolved commit, and of what kind.
///
/// Each key holds the stack of operations in flight for it so an earlier
/// operation settling cannot clear the entry of a later one still running.
/// The reported kind is that of the most recently started operation.
#[derive(Debug, Clone)]
pub struct PendingLedger<K> {
    entries: HashMap<K, Vec<(OperationId, MutationKind)>>,
}

impl<K> Default for PendingLedger<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> PendingLedger<K> {
    pub fn begin(&mut self, key: K, operation: OperationId, kind: MutationKind) {
        self.entries.entry(key).or_default().push((operation, kind));
    }

    /// Drops `operation` from the entry of `key`; removes the key once nothing
    /// is left in flight for it. Returns the kind the operation was started with.
    pub fn settle(&mut self, key: &K, operation: OperationId) -> Option<MutationKind> {
        let stack = self.entries.get_mut(key)?;
        let position = stack.iter().position(|(id, _)| *id == operation)?;
        let (_, kind) = stack.remove(position);
        if stack.is_empty() {
            self.entries.remove(key);
        }
        Some(kind)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn kind(&self, key: &K) -> Option<MutationKind> {
        self.entries
            .get(key)
            .and_then(|stack| stack.last())
            .map(|(_, kind)| *kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settled_key_is_removed() {
        let mut ledger = PendingLedger::default();
        ledger.begin("a", OperationId(1), MutationKind::Update);
        assert!(ledger.contains(&"a"));
        assert_eq!(ledger.kind(&"a"), Some(MutationKind::Update));

        assert_eq!(ledger.settle(&"a", OperationId(1)), Some(MutationKind::Update));
        assert!(!ledger.contains(&"a"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn overlapping_operations_keep_key_pending_until_last_settles() {
        let mut ledger = PendingLedger::default();
        ledger.begin("a", OperationId(1), MutationKind::Update);
        ledger.begin("a", OperationId(2), MutationKind::Delete);
        assert_eq!(ledger.kind(&"a"), Some(MutationKind::Delete));

        ledger.settle(&"a", OperationId(2));
        assert_eq!(ledger.kind(&"a"), Some(MutationKind::Update));

        ledger.settle(&"a", OperationId(1));
        assert_eq!(ledger.kind(&"a"), None);
    }

    #[test]
    fn settling_unknown_operation_is_a_no_op() {
        let mut ledger = PendingLedger::default();
        ledger.begin("a", OperationId(1), MutationKind::Add);
        assert_eq!(ledger.settle(&"a", OperationId(9)), None);
        assert_eq!(ledger.settle(&"b", OperationId(1)), None);
        assert_eq!(ledger.len(), 1);
    }
}
