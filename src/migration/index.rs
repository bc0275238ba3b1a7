use serde::Serialize;
use tracing::{info, warn};

use super::{emit, MigrationOptions, Phase, ProgressCallback, ProgressEvent};
use crate::document::EMPLOYEE_ID;
use crate::store::{DocumentStore, IndexOutcome, IndexSpec};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexReport {
    Created,
    AlreadyPresent,
    /// Dry runs never touch indexes.
    Skipped,
    Failed { code: String, message: String },
}

impl IndexReport {
    pub fn is_ok(&self) -> bool {
        !matches!(self, IndexReport::Failed { .. })
    }
}

pub fn employee_id_index(store: &DocumentStore) -> IndexSpec {
    IndexSpec::unique_non_null(store.collection(), EMPLOYEE_ID)
}

/// Ensures the partial unique index on `employee_id`. Failures are reported,
/// never propagated: by now every data change has already been written.
pub async fn ensure_employee_id_index(
    store: &DocumentStore,
    options: &MigrationOptions,
    progress: Option<&ProgressCallback>,
) -> IndexReport {
    emit(progress, ProgressEvent::PhaseStarted(Phase::Index));
    if options.dry_run {
        return IndexReport::Skipped;
    }

    let spec = employee_id_index(store);
    let report = match store.create_index(&spec).await {
        Ok(IndexOutcome::Created) => IndexReport::Created,
        Ok(IndexOutcome::AlreadyPresent) => IndexReport::AlreadyPresent,
        Err(err) => {
            warn!(
                target: "hris_normalize",
                event = "index_create_warning",
                index = %spec.name,
                code = %err.code(),
                unique_violation = err.is_unique_violation(),
                error = %err
            );
            let report = IndexReport::Failed {
                code: err.code().to_string(),
                message: err.message().to_string(),
            };
            emit(progress, ProgressEvent::IndexWarning(err));
            return report;
        }
    };
    info!(
        target: "hris_normalize",
        event = "index_ensured",
        index = %spec.name,
        outcome = ?report
    );
    report
}
