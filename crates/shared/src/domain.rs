use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{Record, RecordKey};

/// Document key as assigned by the backing store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl RecordKey for RecordId {
    fn from_temporary(raw: String) -> Self {
        Self(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Material,
    Labour,
    Equipment,
    Transport,
    Overhead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    Lead,
    Active,
    Dormant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    Planned,
    InProgress,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    #[serde(default)]
    pub id: RecordId,
    pub description: String,
    pub amount_cents: i64,
    pub category: ExpenseCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<RecordId>,
    pub incurred_on: NaiveDate,
}

impl Expense {
    pub fn draft(
        description: impl Into<String>,
        amount_cents: i64,
        category: ExpenseCategory,
        incurred_on: NaiveDate,
    ) -> Self {
        Self {
            id: RecordId::default(),
            description: description.into(),
            amount_cents,
            category,
            partner: None,
            project_id: None,
            incurred_on,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpensePatch {
    pub description: Option<String>,
    pub amount_cents: Option<i64>,
    pub category: Option<ExpenseCategory>,
    /// `Some(None)` clears the partner.
    pub partner: Option<Option<String>>,
    pub project_id: Option<Option<RecordId>>,
    pub incurred_on: Option<NaiveDate>,
}

impl Record for Expense {
    const COLLECTION: &'static str = "expenses";

    type Key = RecordId;
    type Patch = ExpensePatch;

    fn key(&self) -> &RecordId {
        &self.id
    }

    fn set_key(&mut self, key: RecordId) {
        self.id = key;
    }

    fn apply_patch(&mut self, patch: ExpensePatch) {
        if let Some(v) = patch.description {
            self.description = v;
        }
        if let Some(v) = patch.amount_cents {
            self.amount_cents = v;
        }
        if let Some(v) = patch.category {
            self.category = v;
        }
        if let Some(v) = patch.partner {
            self.partner = v;
        }
        if let Some(v) = patch.project_id {
            self.project_id = v;
        }
        if let Some(v) = patch.incurred_on {
            self.incurred_on = v;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerBalance {
    #[serde(default)]
    pub id: RecordId,
    pub partner_name: String,
    pub balance_cents: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartnerBalancePatch {
    pub partner_name: Option<String>,
    pub balance_cents: Option<i64>,
}

impl Record for PartnerBalance {
    const COLLECTION: &'static str = "partner_balances";

    type Key = RecordId;
    type Patch = PartnerBalancePatch;

    fn key(&self) -> &RecordId {
        &self.id
    }

    fn set_key(&mut self, key: RecordId) {
        self.id = key;
    }

    fn apply_patch(&mut self, patch: PartnerBalancePatch) {
        let mut touched = false;
        if let Some(v) = patch.partner_name {
            self.partner_name = v;
            touched = true;
        }
        if let Some(v) = patch.balance_cents {
            self.balance_cents = v;
            touched = true;
        }
        if touched {
            self.updated_at = Utc::now();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkContact {
    #[serde(default)]
    pub id: RecordId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub status: ContactStatus,
    #[serde(default)]
    pub notes: String,
}

impl NetworkContact {
    pub fn lead(name: impl Into<String>) -> Self {
        Self {
            id: RecordId::default(),
            name: name.into(),
            company: None,
            phone: None,
            email: None,
            status: ContactStatus::Lead,
            notes: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkContactPatch {
    pub name: Option<String>,
    pub company: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub status: Option<ContactStatus>,
    pub notes: Option<String>,
}

impl Record for NetworkContact {
    const COLLECTION: &'static str = "network_contacts";

    type Key = RecordId;
    type Patch = NetworkContactPatch;

    fn key(&self) -> &RecordId {
        &self.id
    }

    fn set_key(&mut self, key: RecordId) {
        self.id = key;
    }

    fn apply_patch(&mut self, patch: NetworkContactPatch) {
        if let Some(v) = patch.name {
            self.name = v;
        }
        if let Some(v) = patch.company {
            self.company = v;
        }
        if let Some(v) = patch.phone {
            self.phone = v;
        }
        if let Some(v) = patch.email {
            self.email = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if let Some(v) = patch.notes {
            self.notes = v;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vessel {
    #[serde(default)]
    pub id: RecordId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hull_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VesselPatch {
    pub name: Option<String>,
    pub hull_number: Option<Option<String>>,
}

impl Record for Vessel {
    const COLLECTION: &'static str = "vessels";

    type Key = RecordId;
    type Patch = VesselPatch;

    fn key(&self) -> &RecordId {
        &self.id
    }

    fn set_key(&mut self, key: RecordId) {
        self.id = key;
    }

    fn apply_patch(&mut self, patch: VesselPatch) {
        if let Some(v) = patch.name {
            self.name = v;
        }
        if let Some(v) = patch.hull_number {
            self.hull_number = v;
        }
    }
}

/// Leaf of the vessel -> project -> department -> work item hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(default)]
    pub id: RecordId,
    pub vessel_id: RecordId,
    pub project_id: RecordId,
    pub department_id: RecordId,
    pub title: String,
    pub status: WorkItemStatus,
    pub progress_percent: u8,
}

impl WorkItem {
    pub fn planned(
        vessel_id: RecordId,
        project_id: RecordId,
        department_id: RecordId,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: RecordId::default(),
            vessel_id,
            project_id,
            department_id,
            title: title.into(),
            status: WorkItemStatus::Planned,
            progress_percent: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkItemPatch {
    pub title: Option<String>,
    pub department_id: Option<RecordId>,
    pub status: Option<WorkItemStatus>,
    pub progress_percent: Option<u8>,
}

impl WorkItemPatch {
    pub fn completed() -> Self {
        Self {
            status: Some(WorkItemStatus::Done),
            progress_percent: Some(100),
            ..Self::default()
        }
    }
}

impl Record for WorkItem {
    const COLLECTION: &'static str = "work_items";

    type Key = RecordId;
    type Patch = WorkItemPatch;

    fn key(&self) -> &RecordId {
        &self.id
    }

    fn set_key(&mut self, key: RecordId) {
        self.id = key;
    }

    fn apply_patch(&mut self, patch: WorkItemPatch) {
        if let Some(v) = patch.title {
            self.title = v;
        }
        if let Some(v) = patch.department_id {
            self.department_id = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if let Some(v) = patch.progress_percent {
            self.progress_percent = v.min(100);
        }
    }
}
