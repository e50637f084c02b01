use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MutationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Add,
    Update,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationKind::Add => "add",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Identifies one optimistic operation for the lifetime of its coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(pub u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationEvent<K> {
    /// Local state changed and the commit was started.
    Applied { key: K, kind: MutationKind },
    Committed { key: K, kind: MutationKind },
    /// An added record swapped its temporary key for the committed one.
    KeyReconciled { temporary: K, key: K },
    RolledBack {
        key: K,
        kind: MutationKind,
        error: MutationError,
    },
}

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub event_capacity: usize,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
        }
    }
}
