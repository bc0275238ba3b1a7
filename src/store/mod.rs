//! JSON document collection kept in a SQLite table.
//!
//! Each collection is a table `(id TEXT PRIMARY KEY, body TEXT)` where `body`
//! holds one JSON object. Filters and indexes are expressed with SQLite's JSON1
//! functions so the store behaves like a small document database.

use serde_json::{Map, Value};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    ConnectOptions, Row, SqlitePool,
};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::document::{Document, DocumentId};
use crate::{AppError, AppResult};

pub mod filter;
pub mod update;

pub use filter::Filter;
pub use update::{UpdateOps, UpdateOutcome};

const MAX_IDENTIFIER_LEN: usize = 64;

/// Plain SQL identifier: `[A-Za-z_][A-Za-z0-9_]*`, at most 64 characters.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= MAX_IDENTIFIER_LEN && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn ensure_identifier(kind: &str, name: &str) -> AppResult<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(
            AppError::new("STORE/INVALID_IDENTIFIER", format!("invalid {kind} name"))
                .with_context(kind.to_string(), name.to_string()),
        )
    }
}

/// Unique index over one field, limited to documents where it is non-null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub field: String,
}

impl IndexSpec {
    pub fn unique_non_null(collection: &str, field: &str) -> Self {
        IndexSpec {
            name: format!("{collection}_{field}_unique"),
            field: field.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Created,
    AlreadyPresent,
}

pub struct DocumentStore {
    pool: SqlitePool,
    collection: String,
}

impl DocumentStore {
    /// Opens an existing database file. The file is never created here.
    pub async fn open(path: &Path, collection: &str) -> AppResult<Self> {
        if !path.exists() {
            return Err(
                AppError::new("STORE/NOT_FOUND", "database not found")
                    .with_context("path", path.display().to_string()),
            );
        }
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(5))
            .log_statements(log::LevelFilter::Off);
        let pool = SqlitePool::connect_with(opts).await.map_err(|err| {
            AppError::from(err)
                .with_context("operation", "open")
                .with_context("path", path.display().to_string())
        })?;
        Self::from_pool(pool, collection).await
    }

    /// Private in-memory database, used by tests and scratch runs.
    pub async fn open_in_memory(collection: &str) -> AppResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool, collection).await
    }

    pub async fn from_pool(pool: SqlitePool, collection: &str) -> AppResult<Self> {
        ensure_identifier("collection", collection)?;
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS \"{collection}\" (\
                 id TEXT PRIMARY KEY,\
                 body TEXT NOT NULL CHECK (json_valid(body))\
             )"
        );
        sqlx::query(&sql).execute(&pool).await.map_err(|err| {
            AppError::from(err)
                .with_context("operation", "ensure_collection")
                .with_context("collection", collection.to_string())
        })?;
        Ok(DocumentStore {
            pool,
            collection: collection.to_string(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn context(&self, err: impl Into<AppError>, operation: &str) -> AppError {
        err.into()
            .with_context("operation", operation.to_string())
            .with_context("collection", self.collection.clone())
    }

    pub async fn insert(&self, fields: Map<String, Value>) -> AppResult<DocumentId> {
        let id = DocumentId::new(Uuid::now_v7().as_simple().to_string());
        self.insert_with_id(&id, fields).await?;
        Ok(id)
    }

    pub async fn insert_with_id(&self, id: &DocumentId, fields: Map<String, Value>) -> AppResult<()> {
        let body = serde_json::to_string(&Value::Object(fields))?;
        let sql = format!("INSERT INTO \"{}\" (id, body) VALUES (?, ?)", self.collection);
        sqlx::query(&sql)
            .bind(id.as_str())
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(|err| self.context(err, "insert").with_context("document_id", id.to_string()))?;
        Ok(())
    }

    pub async fn get(&self, id: &DocumentId) -> AppResult<Option<Document>> {
        let sql = format!("SELECT body FROM \"{}\" WHERE id = ?", self.collection);
        let body: Option<String> = sqlx::query_scalar(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| self.context(err, "get").with_context("document_id", id.to_string()))?;
        body.map(|body| Document::from_body(id.clone(), &body))
            .transpose()
    }

    /// All documents matching `filter`, in insertion order.
    pub async fn find(&self, filter: &Filter) -> AppResult<Vec<Document>> {
        let mut binds = Vec::new();
        let clause = filter.to_sql(&mut binds);
        let sql = format!(
            "SELECT id, body FROM \"{}\" WHERE {clause} ORDER BY rowid",
            self.collection
        );
        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind.clone());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|err| self.context(err, "find"))?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let body: String = row.try_get("body")?;
            docs.push(Document::from_body(DocumentId::new(id), &body)?);
        }
        debug!(
            target: "hris_normalize",
            event = "store_find",
            collection = %self.collection,
            matched = docs.len()
        );
        Ok(docs)
    }

    pub async fn count(&self, filter: &Filter) -> AppResult<u64> {
        let mut binds = Vec::new();
        let clause = filter.to_sql(&mut binds);
        let sql = format!("SELECT COUNT(*) FROM \"{}\" WHERE {clause}", self.collection);
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for bind in &binds {
            query = query.bind(bind.clone());
        }
        let count = query
            .fetch_one(&self.pool)
            .await
            .map_err(|err| self.context(err, "count"))?;
        Ok(count.max(0) as u64)
    }

    /// Applies `ops` to one document inside a single transaction.
    pub async fn update_one(&self, id: &DocumentId, ops: &UpdateOps) -> AppResult<UpdateOutcome> {
        let err_ctx = |err: sqlx::Error, step: &str| {
            self.context(err, "update_one")
                .with_context("step", step.to_string())
                .with_context("document_id", id.to_string())
        };

        let mut tx = self.pool.begin().await.map_err(|err| err_ctx(err, "begin_tx"))?;
        let select = format!("SELECT body FROM \"{}\" WHERE id = ?", self.collection);
        let body: Option<String> = sqlx::query_scalar(&select)
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|err| err_ctx(err, "load"))?;

        let Some(body) = body else {
            tx.rollback().await.map_err(|err| err_ctx(err, "rollback"))?;
            return Ok(UpdateOutcome::default());
        };

        let mut doc = Document::from_body(id.clone(), &body)?;
        let modified = ops.apply(&mut doc.fields);
        if modified {
            let new_body = serde_json::to_string(&Value::Object(doc.fields))?;
            let update = format!("UPDATE \"{}\" SET body = ? WHERE id = ?", self.collection);
            sqlx::query(&update)
                .bind(new_body)
                .bind(id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|err| err_ctx(err, "write"))?;
        }
        tx.commit().await.map_err(|err| err_ctx(err, "commit_tx"))?;

        Ok(UpdateOutcome {
            matched: true,
            modified,
        })
    }

    /// Keyed on `(json_type, json_extract)` since `json_extract` alone maps
    /// `true` and `1`, or an object and its JSON text, to the same SQL value.
    fn index_sql(&self, spec: &IndexSpec) -> String {
        let path = filter::json_path(&spec.field);
        format!(
            "CREATE UNIQUE INDEX \"{name}\" ON \"{coll}\" \
             (json_type(body, '{path}'), json_extract(body, '{path}')) \
             WHERE json_type(body, '{path}') IS NOT NULL AND json_type(body, '{path}') <> 'null'",
            name = spec.name,
            coll = self.collection,
        )
    }

    /// Creates the index, or confirms an identical one is already in place.
    pub async fn create_index(&self, spec: &IndexSpec) -> AppResult<IndexOutcome> {
        ensure_identifier("index", &spec.name)?;
        ensure_identifier("field", &spec.field)?;
        let wanted = self.index_sql(spec);

        let existing: Option<String> =
            sqlx::query_scalar("SELECT sql FROM sqlite_master WHERE type = 'index' AND name = ?")
                .bind(&spec.name)
                .fetch_optional(&self.pool)
                .await
                .map_err(|err| self.context(err, "create_index"))?;

        if let Some(existing) = existing {
            if normalize_sql(&existing) == normalize_sql(&wanted) {
                return Ok(IndexOutcome::AlreadyPresent);
            }
            return Err(AppError::new(
                "INDEX/CONFLICT",
                "an index with this name exists with a different definition",
            )
            .with_context("index", spec.name.clone())
            .with_context("collection", self.collection.clone()));
        }

        sqlx::query(&wanted)
            .execute(&self.pool)
            .await
            .map_err(|err| {
                self.context(err, "create_index")
                    .with_context("index", spec.name.clone())
            })?;
        info!(
            target: "hris_normalize",
            event = "index_created",
            collection = %self.collection,
            index = %spec.name
        );
        Ok(IndexOutcome::Created)
    }

    pub async fn index_names(&self) -> AppResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = ? AND sql IS NOT NULL ORDER BY name",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| self.context(err, "index_names"))?;
        Ok(names)
    }
}

fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}
