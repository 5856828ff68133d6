//! Datastore collaborators of the fan-out core.
//!
//! Two storage abstractions, each with interchangeable backends:
//!
//! - `RecordStore`: read-only queries over accounts and jobs, used by the
//!   recipient resolver and the application flow
//! - `NotificationLogStore`: the atomic batch primitive the log writer
//!   commits in-app notifications through
//!
//! `MemoryRecordStore` / `MemoryLogStore` keep everything in process and are
//! the default. `PostgresRecordStore` / `PostgresLogStore` persist through
//! sqlx. Use `create_stores()` to pick backends from configuration.

mod factory;
pub mod log_store;
pub mod memory;
pub mod postgres;
pub mod records;

pub use factory::{create_stores, Stores};
pub use log_store::{LogStoreError, NotificationLogStore};
pub use memory::{MemoryLogStore, MemoryRecordStore};
pub use postgres::{PostgresLogStore, PostgresRecordStore};
pub use records::{AccountRecord, JobRecord, RecordStore, RecordStoreError};
