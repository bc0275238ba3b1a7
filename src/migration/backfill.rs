use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::rename::plan_renames;
use super::{emit, MigrationOptions, Phase, ProgressCallback, ProgressEvent};
use crate::document::{Document, EMPLOYEE_ID, LEGACY_EMPLOYEE_ID};
use crate::ids::IdGenerator;
use crate::store::{DocumentStore, Filter, UpdateOps};
use crate::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierSource {
    /// Copied from the legacy `employeeid` field.
    Legacy,
    /// Synthesized by the configured generator.
    Generated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierPlan {
    pub employee_id: Value,
    pub source: IdentifierSource,
    pub ops: UpdateOps,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillCounts {
    pub filled_from_legacy: u64,
    pub generated: u64,
}

impl BackfillCounts {
    pub fn total(&self) -> u64 {
        self.filled_from_legacy + self.generated
    }
}

/// Decides how a document gets its `employee_id`, or `None` when it already
/// has a truthy one.
pub fn plan_identifier(doc: &Document, generator: &dyn IdGenerator) -> Option<IdentifierPlan> {
    if doc.is_truthy(EMPLOYEE_ID) {
        return None;
    }

    if doc.is_truthy(LEGACY_EMPLOYEE_ID) {
        let value = doc.get(LEGACY_EMPLOYEE_ID).cloned().unwrap_or(Value::Null);
        return Some(IdentifierPlan {
            ops: UpdateOps::new()
                .set(EMPLOYEE_ID, value.clone())
                .unset(LEGACY_EMPLOYEE_ID),
            employee_id: value,
            source: IdentifierSource::Legacy,
        });
    }

    let generated = Value::String(generator.generate(&doc.id));
    Some(IdentifierPlan {
        ops: UpdateOps::new().set(EMPLOYEE_ID, generated.clone()),
        employee_id: generated,
        source: IdentifierSource::Generated,
    })
}

/// Gives every document lacking `employee_id` one, preferring the legacy value.
pub async fn backfill_employee_ids(
    store: &DocumentStore,
    options: &MigrationOptions,
    generator: &dyn IdGenerator,
    progress: Option<&ProgressCallback>,
) -> AppResult<BackfillCounts> {
    emit(progress, ProgressEvent::PhaseStarted(Phase::Backfill));
    let docs = store.find(&Filter::missing_or_null(EMPLOYEE_ID)).await?;

    let mut counts = BackfillCounts::default();
    for mut doc in docs {
        // A dry run wrote nothing in phase one, so plan against the renamed shape.
        if options.dry_run {
            plan_renames(&doc).apply(&mut doc.fields);
        }
        // Re-checked per document; the scan filter alone is not trusted.
        let Some(plan) = plan_identifier(&doc, generator) else {
            debug!(
                target: "hris_normalize",
                event = "identifier_already_present",
                document_id = %doc.id
            );
            continue;
        };

        if !options.dry_run && !store.update_one(&doc.id, &plan.ops).await?.matched {
            continue;
        }
        match plan.source {
            IdentifierSource::Legacy => counts.filled_from_legacy += 1,
            IdentifierSource::Generated => counts.generated += 1,
        }
        info!(
            target: "hris_normalize",
            event = "identifier_filled",
            document_id = %doc.id,
            employee_id = %plan.employee_id,
            source = ?plan.source,
            dry_run = options.dry_run
        );
        emit(
            progress,
            ProgressEvent::IdentifierFilled {
                id: doc.id.clone(),
                employee_id: plan.employee_id.clone(),
                source: plan.source,
            },
        );
    }

    info!(
        target: "hris_normalize",
        event = "backfill_phase_complete",
        filled_from_legacy = counts.filled_from_legacy,
        generated = counts.generated
    );
    emit(
        progress,
        ProgressEvent::PhaseFinished {
            phase: Phase::Backfill,
            count: counts.total(),
        },
    );
    Ok(counts)
}
