//! Employee field normalization.
//!
//! Three phases run strictly in order against one collection:
//! 1. legacy field names are moved onto their canonical names,
//! 2. documents still lacking `employee_id` receive one,
//! 3. a partial unique index on `employee_id` is ensured.
//!
//! Identifiers must be populated before the index exists, otherwise half
//! migrated documents could trip the uniqueness check. Every phase selects
//! only documents that still need work, so a second run writes nothing.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::document::DocumentId;
use crate::ids::IdGenerator;
use crate::store::DocumentStore;
use crate::{AppError, AppResult};

pub mod backfill;
pub mod index;
pub mod rename;

pub use backfill::{
    backfill_employee_ids, plan_identifier, BackfillCounts, IdentifierPlan, IdentifierSource,
};
pub use index::{ensure_employee_id_index, IndexReport};
pub use rename::{plan_renames, rename_legacy_fields};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationOptions {
    /// Plan and count every change without writing anything.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Rename,
    Backfill,
    Index,
}

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started { collection: String },
    PhaseStarted(Phase),
    DocumentMigrated { id: DocumentId },
    IdentifierFilled {
        id: DocumentId,
        employee_id: Value,
        source: IdentifierSource,
    },
    PhaseFinished { phase: Phase, count: u64 },
    IndexWarning(AppError),
    IndexEnsured(IndexReport),
    Completed,
}

pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

pub(crate) fn emit(progress: Option<&ProgressCallback>, event: ProgressEvent) {
    if let Some(cb) = progress {
        cb(&event);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    pub collection: String,
    pub renamed: u64,
    pub filled_from_legacy: u64,
    pub generated: u64,
    pub backfilled: u64,
    pub index: IndexReport,
    pub dry_run: bool,
    pub elapsed_ms: u64,
}

/// Runs the three phases. Store errors abort immediately; index problems are
/// carried in [`MigrationSummary::index`].
pub async fn run_migration(
    store: &DocumentStore,
    options: &MigrationOptions,
    generator: &dyn IdGenerator,
    progress: Option<ProgressCallback>,
) -> AppResult<MigrationSummary> {
    let started = Instant::now();
    let progress = progress.as_ref();
    info!(
        target: "hris_normalize",
        event = "migration_start",
        collection = %store.collection(),
        dry_run = options.dry_run
    );
    emit(
        progress,
        ProgressEvent::Started {
            collection: store.collection().to_string(),
        },
    );

    let renamed = rename_legacy_fields(store, options, progress).await?;
    let counts = backfill_employee_ids(store, options, generator, progress).await?;
    let index = ensure_employee_id_index(store, options, progress).await;
    if index.is_ok() {
        emit(progress, ProgressEvent::IndexEnsured(index.clone()));
    }

    let summary = MigrationSummary {
        collection: store.collection().to_string(),
        renamed,
        filled_from_legacy: counts.filled_from_legacy,
        generated: counts.generated,
        backfilled: counts.total(),
        index,
        dry_run: options.dry_run,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        target: "hris_normalize",
        event = "migration_complete",
        renamed = summary.renamed,
        backfilled = summary.backfilled,
        index = ?summary.index,
        elapsed_ms = summary.elapsed_ms
    );
    emit(progress, ProgressEvent::Completed);
    Ok(summary)
}
