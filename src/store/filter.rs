use crate::document::Document;

/// Document predicate understood by both the SQLite store and in-process checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    All,
    /// Field is present, whatever its value (including `null`).
    Exists(String),
    /// Field is absent or explicitly `null`.
    MissingOrNull(String),
    Any(Vec<Filter>),
}

impl Filter {
    pub fn exists(field: impl Into<String>) -> Self {
        Filter::Exists(field.into())
    }

    pub fn missing_or_null(field: impl Into<String>) -> Self {
        Filter::MissingOrNull(field.into())
    }

    pub fn any_exists<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::Any(fields.into_iter().map(Filter::exists).collect())
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Exists(field) => doc.get(field).is_some(),
            Filter::MissingOrNull(field) => doc.is_missing_or_null(field),
            Filter::Any(filters) => filters.iter().any(|f| f.matches(doc)),
        }
    }

    /// Renders a WHERE clause over the `body` column, pushing JSON paths to `binds`.
    pub(crate) fn to_sql(&self, binds: &mut Vec<String>) -> String {
        match self {
            Filter::All => "1".to_string(),
            Filter::Exists(field) => {
                binds.push(json_path(field));
                "json_type(body, ?) IS NOT NULL".to_string()
            }
            Filter::MissingOrNull(field) => {
                binds.push(json_path(field));
                binds.push(json_path(field));
                "(json_type(body, ?) IS NULL OR json_type(body, ?) = 'null')".to_string()
            }
            Filter::Any(filters) if filters.is_empty() => "0".to_string(),
            Filter::Any(filters) => {
                let parts: Vec<String> = filters.iter().map(|f| f.to_sql(binds)).collect();
                format!("({})", parts.join(" OR "))
            }
        }
    }
}

pub(crate) fn json_path(field: &str) -> String {
    format!("$.\"{field}\"")
}
