use tracing::info;

use super::{emit, MigrationOptions, Phase, ProgressCallback, ProgressEvent};
use crate::document::{is_truthy, legacy_fields, Document, LegacyPresence, FIELD_RENAMES};
use crate::store::{DocumentStore, Filter, UpdateOps};
use crate::AppResult;

/// Set/unset pairs that move populated legacy values onto empty canonical fields.
///
/// A canonical field that is already truthy is never touched, and its legacy
/// twin is then left in place as well.
pub fn plan_renames(doc: &Document) -> UpdateOps {
    let mut ops = UpdateOps::new();
    for rename in FIELD_RENAMES.iter() {
        let Some(value) = doc.get(rename.legacy) else {
            continue;
        };
        let carry = match rename.presence {
            LegacyPresence::Truthy => is_truthy(value),
            LegacyPresence::NonNull => !value.is_null(),
        };
        if carry && !doc.is_truthy(rename.canonical) {
            ops = ops.set(rename.canonical, value.clone()).unset(rename.legacy);
        }
    }
    ops
}

pub fn legacy_filter() -> Filter {
    Filter::any_exists(legacy_fields())
}

/// Renames legacy fields on every document that still carries one.
/// Returns the number of documents actually modified.
pub async fn rename_legacy_fields(
    store: &DocumentStore,
    options: &MigrationOptions,
    progress: Option<&ProgressCallback>,
) -> AppResult<u64> {
    emit(progress, ProgressEvent::PhaseStarted(Phase::Rename));
    let docs = store.find(&legacy_filter()).await?;
    let scanned = docs.len();

    let mut renamed = 0u64;
    for doc in docs {
        let ops = plan_renames(&doc);
        if ops.is_empty() {
            continue;
        }

        let applied = if options.dry_run {
            true
        } else {
            let outcome = store.update_one(&doc.id, &ops).await?;
            outcome.matched && outcome.modified
        };
        if applied {
            renamed += 1;
            info!(
                target: "hris_normalize",
                event = "rename_applied",
                document_id = %doc.id,
                fields = ?ops.set.keys().collect::<Vec<_>>(),
                dry_run = options.dry_run
            );
            emit(progress, ProgressEvent::DocumentMigrated { id: doc.id.clone() });
        }
    }

    info!(
        target: "hris_normalize",
        event = "rename_phase_complete",
        scanned,
        renamed
    );
    emit(
        progress,
        ProgressEvent::PhaseFinished {
            phase: Phase::Rename,
            count: renamed,
        },
    );
    Ok(renamed)
}
