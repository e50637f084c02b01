use super::*;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{
    domain::{
        ContactStatus, Expense, ExpenseCategory, ExpensePatch, NetworkContact,
        NetworkContactPatch, RecordId,
    },
    error::BackendError,
};
use std::sync::Mutex;

/// In-memory store double that can be told to reject every call.
struct TestStore<R: Record> {
    records: Mutex<Vec<R>>,
    fail_with: Mutex<Option<String>>,
    next_id: Mutex<u32>,
}

impl<R: Record<Key = RecordId>> TestStore<R> {
    fn with_records(records: Vec<R>) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(records),
            fail_with: Mutex::new(None),
            next_id: Mutex::new(1),
        })
    }

    fn fail_with(&self, err: impl Into<String>) {
        *self.fail_with.lock().expect("lock") = Some(err.into());
    }

    fn check(&self) -> Result<()> {
        match self.fail_with.lock().expect("lock").as_ref() {
            Some(err) => Err(anyhow!(err.clone())),
            None => Ok(()),
        }
    }

    fn records(&self) -> Vec<R> {
        self.records.lock().expect("lock").clone()
    }
}

#[async_trait]
impl<R: Record<Key = RecordId>> RecordStore<R> for TestStore<R> {
    async fn list(&self) -> Result<Vec<R>> {
        self.check()?;
        Ok(self.records())
    }

    async fn insert(&self, mut record: R) -> Result<RecordId> {
        self.check()?;
        let id = {
            let mut next = self.next_id.lock().expect("lock");
            let id = RecordId(format!("doc-{next}"));
            *next += 1;
            id
        };
        record.set_key(id.clone());
        self.records.lock().expect("lock").insert(0, record);
        Ok(id)
    }

    async fn update(&self, key: RecordId, patch: R::Patch) -> Result<()> {
        self.check()?;
        let mut records = self.records.lock().expect("lock");
        let record = records
            .iter_mut()
            .find(|record| record.key() == &key)
            .ok_or_else(|| BackendError::not_found(R::COLLECTION, key.as_str()))?;
        record.apply_patch(patch);
        Ok(())
    }

    async fn delete(&self, key: RecordId) -> Result<()> {
        self.check()?;
        let mut records = self.records.lock().expect("lock");
        let before = records.len();
        records.retain(|record| record.key() != &key);
        if records.len() == before {
            return Err(BackendError::not_found(R::COLLECTION, key.as_str()).into());
        }
        Ok(())
    }
}

fn expense(id: &str, description: &str, amount_cents: i64) -> Expense {
    let mut expense = Expense::draft(
        description,
        amount_cents,
        ExpenseCategory::Material,
        NaiveDate::from_ymd_opt(2026, 5, 2).expect("date"),
    );
    expense.id = RecordId::from(id);
    expense
}

#[tokio::test]
async fn load_replaces_collection_and_resets_loading() {
    let store = TestStore::with_records(vec![expense("e1", "pipe", 1_000)]);
    let controller: RecordController<Expense> = RecordController::new(store.clone());

    assert!(controller.load().await);

    let coordinator = controller.coordinator();
    assert_eq!(coordinator.items(), store.records());
    assert!(!coordinator.loading());
    assert_eq!(coordinator.error(), None);
}

#[tokio::test]
async fn load_failure_records_error_and_keeps_collection() {
    let store = TestStore::with_records(vec![expense("e1", "pipe", 1_000)]);
    let controller: RecordController<Expense> = RecordController::new(store.clone());
    assert!(controller.load().await);

    store.fail_with("backend unavailable");
    assert!(!controller.load().await);

    let coordinator = controller.coordinator();
    assert_eq!(coordinator.len(), 1);
    assert!(!coordinator.loading());
    match coordinator.error() {
        Some(MutationError::Load { collection, reason }) => {
            assert_eq!(collection, "expenses");
            assert!(reason.contains("backend unavailable"));
        }
        other => panic!("unexpected error state: {other:?}"),
    }
}

#[tokio::test]
async fn create_prepends_record_under_store_key() {
    let store = TestStore::with_records(vec![expense("e1", "pipe", 1_000)]);
    let controller: RecordController<Expense> = RecordController::new(store.clone());
    controller.load().await;

    let key = controller
        .create(expense("", "welding rods", 4_200))
        .await
        .expect("created");

    assert_eq!(key, RecordId::from("doc-1"));
    let items = controller.coordinator().items();
    assert_eq!(items[0].id, key);
    assert_eq!(items[0].description, "welding rods");
    assert_eq!(items.len(), 2);
    assert_eq!(store.records()[0].id, key);
}

#[tokio::test]
async fn update_merges_patch_locally_and_in_store() {
    let store = TestStore::with_records(vec![expense("e1", "pipe", 1_000)]);
    let controller: RecordController<Expense> = RecordController::new(store.clone());
    controller.load().await;

    let patch = ExpensePatch {
        amount_cents: Some(1_250),
        ..ExpensePatch::default()
    };
    assert!(controller.update(RecordId::from("e1"), patch).await);

    let local = controller
        .coordinator()
        .get(&RecordId::from("e1"))
        .expect("local record");
    assert_eq!(local.amount_cents, 1_250);
    assert_eq!(local.description, "pipe");
    assert_eq!(store.records()[0].amount_cents, 1_250);
}

#[tokio::test]
async fn rejected_update_restores_previous_value() {
    let store = TestStore::with_records(vec![expense("e1", "pipe", 1_000)]);
    let controller: RecordController<Expense> = RecordController::new(store.clone());
    controller.load().await;
    store.fail_with("permission denied");

    let patch = ExpensePatch {
        description: Some("stainless pipe".to_string()),
        ..ExpensePatch::default()
    };
    assert!(!controller.update(RecordId::from("e1"), patch).await);

    let local = controller
        .coordinator()
        .get(&RecordId::from("e1"))
        .expect("local record");
    assert_eq!(local.description, "pipe");
    assert!(matches!(
        controller.coordinator().error(),
        Some(MutationError::CommitRejected { .. })
    ));
}

#[tokio::test]
async fn remove_of_unknown_key_fails_without_touching_store() {
    let store = TestStore::with_records(vec![expense("e1", "pipe", 1_000)]);
    let controller: RecordController<Expense> = RecordController::new(store.clone());
    controller.load().await;

    assert!(!controller.remove(RecordId::from("nope")).await);
    assert_eq!(store.records().len(), 1);
    assert!(matches!(
        controller.coordinator().error(),
        Some(MutationError::NotFound { .. })
    ));
}

#[tokio::test]
async fn rejected_remove_puts_contact_back() {
    let mut first = NetworkContact::lead("Harbor Steel");
    first.id = RecordId::from("c1");
    let mut second = NetworkContact::lead("Dockside Welding");
    second.id = RecordId::from("c2");
    let store = TestStore::with_records(vec![first.clone(), second.clone()]);
    let controller: RecordController<NetworkContact> = RecordController::new(store.clone());
    controller.load().await;

    let patch = NetworkContactPatch {
        status: Some(ContactStatus::Active),
        ..NetworkContactPatch::default()
    };
    assert!(controller.update(RecordId::from("c2"), patch).await);

    store.fail_with("offline");
    assert!(!controller.remove(RecordId::from("c1")).await);

    let items = controller.coordinator().items();
    assert_eq!(items[0], first);
    assert_eq!(items[1].status, ContactStatus::Active);
}
