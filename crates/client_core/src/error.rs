use thiserror::Error;

use crate::types::MutationKind;

/// Last failure observed by a coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("{kind} target not found: {key}")]
    NotFound { kind: MutationKind, key: String },
    #[error("{kind} commit rejected for {key}: {reason}")]
    CommitRejected {
        kind: MutationKind,
        key: String,
        reason: String,
    },
    /// The operation's future was dropped before its commit settled.
    #[error("{kind} abandoned before its commit settled: {key}")]
    Abandoned { kind: MutationKind, key: String },
    #[error("failed to load {collection}: {reason}")]
    Load { collection: String, reason: String },
    #[error("{0}")]
    Other(String),
}

impl MutationError {
    pub fn not_found(kind: MutationKind, key: impl ToString) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub fn commit_rejected(kind: MutationKind, key: impl ToString, err: &anyhow::Error) -> Self {
        Self::CommitRejected {
            kind,
            key: key.to_string(),
            reason: format!("{err:#}"),
        }
    }

    pub fn abandoned(kind: MutationKind, key: impl ToString) -> Self {
        Self::Abandoned {
            kind,
            key: key.to_string(),
        }
    }

    pub fn kind(&self) -> Option<MutationKind> {
        match self {
            Self::NotFound { kind, .. }
            | Self::CommitRejected { kind, .. }
            | Self::Abandoned { kind, .. } => Some(*kind),
            Self::Load { .. } | Self::Other(_) => None,
        }
    }
}
