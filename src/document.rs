use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::{AppError, AppResult};

/// Canonical identifier field every employee document must carry.
pub const EMPLOYEE_ID: &str = "employee_id";
/// Legacy spelling of [`EMPLOYEE_ID`].
pub const LEGACY_EMPLOYEE_ID: &str = "employeeid";

/// How a legacy value has to look before it is carried over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyPresence {
    /// Present and truthy (`""`, `0`, `false` and `null` do not count).
    Truthy,
    /// Present and not `null`; falsy scalars still count.
    NonNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRename {
    pub legacy: &'static str,
    pub canonical: &'static str,
    pub presence: LegacyPresence,
}

pub const FIELD_RENAMES: [FieldRename; 4] = [
    FieldRename {
        legacy: LEGACY_EMPLOYEE_ID,
        canonical: EMPLOYEE_ID,
        presence: LegacyPresence::Truthy,
    },
    FieldRename {
        legacy: "legalname",
        canonical: "legal_name",
        presence: LegacyPresence::Truthy,
    },
    FieldRename {
        legacy: "hiredate",
        canonical: "hire_date",
        presence: LegacyPresence::Truthy,
    },
    FieldRename {
        legacy: "preferredname",
        canonical: "preferred_name",
        presence: LegacyPresence::NonNull,
    },
];

pub fn legacy_fields() -> impl Iterator<Item = &'static str> {
    FIELD_RENAMES.iter().map(|rename| rename.legacy)
}

/// Loose truthiness over JSON values: `null`, `false`, zero and the empty
/// string are falsy, every array and object is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Opaque native identifier assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        DocumentId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The trailing `n` characters, or the whole id when it is shorter.
    pub fn tail(&self, n: usize) -> &str {
        let count = self.0.chars().count();
        if count <= n {
            return &self.0;
        }
        let start = self
            .0
            .char_indices()
            .nth(count - n)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        &self.0[start..]
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: DocumentId, fields: Map<String, Value>) -> Self {
        Document { id, fields }
    }

    /// Parses a stored body, which must be a JSON object.
    pub fn from_body(id: DocumentId, body: &str) -> AppResult<Self> {
        match serde_json::from_str::<Value>(body)
            .map_err(|err| AppError::from(err).with_context("document_id", id.to_string()))?
        {
            Value::Object(fields) => Ok(Document { id, fields }),
            other => Err(AppError::new(
                "DOC/MALFORMED",
                format!("document body must be a JSON object, found {}", json_kind(&other)),
            )
            .with_context("document_id", id.to_string())),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn is_truthy(&self, field: &str) -> bool {
        self.get(field).map(is_truthy).unwrap_or(false)
    }

    pub fn is_missing_or_null(&self, field: &str) -> bool {
        matches!(self.get(field), None | Some(Value::Null))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
