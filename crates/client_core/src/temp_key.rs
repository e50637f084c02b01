use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use shared::record::TEMPORARY_KEY_PREFIX;
use uuid::Uuid;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Placeholder key for a record the backing store has not accepted yet.
///
/// The process-wide sequence makes keys unique within the process; the
/// timestamp and random suffix keep them distinct across processes.
pub fn temporary_key() -> String {
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{TEMPORARY_KEY_PREFIX}{}-{sequence}-{}",
        Utc::now().timestamp_millis(),
        &suffix[..8]
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn keys_are_prefixed_and_unique() {
        let keys: HashSet<String> = (0..1_000).map(|_| temporary_key()).collect();
        assert_eq!(keys.len(), 1_000);
        assert!(keys.iter().all(|key| key.starts_with(TEMPORARY_KEY_PREFIX)));
    }
}
