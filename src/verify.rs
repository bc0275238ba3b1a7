use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::document::{legacy_fields, DocumentId, EMPLOYEE_ID};
use crate::store::{DocumentStore, Filter};
use crate::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateEmployeeId {
    pub employee_id: String,
    pub documents: Vec<DocumentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyLeftover {
    pub document: DocumentId,
    pub field: String,
}

/// Post-migration health of a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvariantReport {
    pub scanned: u64,
    pub missing_employee_id: Vec<DocumentId>,
    pub duplicate_employee_ids: Vec<DuplicateEmployeeId>,
    pub legacy_leftovers: Vec<LegacyLeftover>,
}

impl InvariantReport {
    pub fn is_clean(&self) -> bool {
        self.missing_employee_id.is_empty()
            && self.duplicate_employee_ids.is_empty()
            && self.legacy_leftovers.is_empty()
    }
}

/// Scans the whole collection for missing ids, duplicate ids and non-null
/// legacy fields.
pub async fn check_invariants(store: &DocumentStore) -> AppResult<InvariantReport> {
    let docs = store.find(&Filter::All).await?;
    let mut report = InvariantReport {
        scanned: docs.len() as u64,
        ..InvariantReport::default()
    };

    // Keyed by the JSON text, so `true`, `1` and `"1"` stay distinct like the
    // (type, value) key of the unique index.
    let mut by_employee_id: BTreeMap<String, Vec<DocumentId>> = BTreeMap::new();
    for doc in &docs {
        match doc.get(EMPLOYEE_ID) {
            None | Some(serde_json::Value::Null) => report.missing_employee_id.push(doc.id.clone()),
            Some(value) => by_employee_id
                .entry(value.to_string())
                .or_default()
                .push(doc.id.clone()),
        }
        for field in legacy_fields() {
            if doc.get(field).is_some_and(|v| !v.is_null()) {
                report.legacy_leftovers.push(LegacyLeftover {
                    document: doc.id.clone(),
                    field: field.to_string(),
                });
            }
        }
    }

    report.duplicate_employee_ids = by_employee_id
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(employee_id, documents)| DuplicateEmployeeId {
            employee_id,
            documents,
        })
        .collect();

    info!(
        target: "hris_normalize",
        event = "invariant_check",
        scanned = report.scanned,
        missing = report.missing_employee_id.len(),
        duplicates = report.duplicate_employee_ids.len(),
        legacy_leftovers = report.legacy_leftovers.len()
    );
    Ok(report)
}

pub fn format_human_summary(report: &InvariantReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Scanned documents:        {}\n", report.scanned));
    out.push_str(&format!(
        "Missing employee_id:      {}\n",
        report.missing_employee_id.len()
    ));
    out.push_str(&format!(
        "Duplicate employee_id:    {}\n",
        report.duplicate_employee_ids.len()
    ));
    out.push_str(&format!(
        "Legacy fields remaining:  {}",
        report.legacy_leftovers.len()
    ));
    for id in &report.missing_employee_id {
        out.push_str(&format!("\n  missing employee_id: {id}"));
    }
    for dup in &report.duplicate_employee_ids {
        let ids: Vec<&str> = dup.documents.iter().map(DocumentId::as_str).collect();
        out.push_str(&format!(
            "\n  duplicate {}: {}",
            dup.employee_id,
            ids.join(", ")
        ));
    }
    for leftover in &report.legacy_leftovers {
        out.push_str(&format!(
            "\n  legacy field {} on {}",
            leftover.field, leftover.document
        ));
    }
    out
}
