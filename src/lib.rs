//! Normalizes legacy HRIS employee documents: renames legacy field names,
//! backfills `employee_id`, and ensures a partial unique index on it.

pub mod config;
pub mod document;
pub mod error;
pub mod ids;
pub mod logging;
pub mod migration;
pub mod store;
pub mod time;
pub mod verify;

pub use config::MigrationConfig;
pub use document::{Document, DocumentId};
pub use error::{AppError, AppResult};
pub use ids::{IdGenerator, IdStrategy, TimestampSuffixGenerator, UuidGenerator};
pub use migration::{run_migration, MigrationOptions, MigrationSummary, ProgressEvent};
pub use store::DocumentStore;
