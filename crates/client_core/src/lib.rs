pub mod controller;
pub mod coordinator;
mod durable_store;
pub mod error;
pub mod ledger;
pub mod store;
mod temp_key;
pub mod types;

pub use controller::RecordController;
pub use coordinator::{CollectionState, MutationCoordinator};
pub use durable_store::DurableRecordStore;
pub use error::MutationError;
pub use store::RecordStore;
pub use temp_key::temporary_key;
pub use types::{CoordinatorOptions, MutationEvent, MutationKind, OperationId};
