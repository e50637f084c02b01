use std::{fmt, hash::Hash};

use serde::{de::DeserializeOwned, Serialize};

/// Prefix carried by every locally generated placeholder key.
pub const TEMPORARY_KEY_PREFIX: &str = "temp-";

/// Identifier type usable as a record key.
///
/// Keys must be constructible from a locally generated placeholder so a record
/// can be shown before the backing store has assigned its real key.
pub trait RecordKey: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {
    fn from_temporary(raw: String) -> Self;

    fn is_temporary(&self) -> bool {
        self.to_string().starts_with(TEMPORARY_KEY_PREFIX)
    }
}

impl RecordKey for String {
    fn from_temporary(raw: String) -> Self {
        raw
    }
}

/// A document held in a named collection of the backing store.
///
/// `apply_patch` is a shallow merge: every field present in the patch replaces
/// the record's field, every absent field is left as it was.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;

    type Key: RecordKey;
    type Patch: Clone + Send + Sync + 'static;

    fn key(&self) -> &Self::Key;
    fn set_key(&mut self, key: Self::Key);
    fn apply_patch(&mut self, patch: Self::Patch);

    fn patched(&self, patch: Self::Patch) -> Self {
        let mut next = self.clone();
        next.apply_patch(patch);
        next
    }
}
