#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use assert_cmd::Command;
use hris_normalize::{document::DocumentId, DocumentStore};
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::tempdir;

fn normalize() -> Command {
    let mut cmd = Command::cargo_bin("normalize").expect("normalize binary");
    for key in [
        "HRIS_DB_NAME",
        "HRIS_COLLECTION",
        "HRIS_DATA_DIR",
        "HRIS_DB_PATH",
        "HRIS_ID_STRATEGY",
    ] {
        cmd.env_remove(key);
    }
    cmd.env("HRIS_NORMALIZE_LOG", "off");
    cmd
}

async fn seed(path: &Path, collection: &str, docs: &[(&str, Value)]) -> anyhow::Result<()> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
        )
        .await?;
    let store = DocumentStore::from_pool(pool, collection).await?;
    for (id, doc) in docs {
        store
            .insert_with_id(&DocumentId::new(*id), doc.as_object().cloned().unwrap())
            .await?;
    }
    store.close().await;
    Ok(())
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[tokio::test]
async fn run_prints_progress_and_summary() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("hris.sqlite3");
    seed(
        &db,
        "employees",
        &[
            ("000000000000000000aaaaaa", json!({"employeeid": "E1", "legalname": "Jane Doe"})),
            ("000000000000000000bbbbbb", json!({"legal_name": "No Id"})),
        ],
    )
    .await?;

    let output = normalize()
        .args(["--db", db.to_str().unwrap(), "run", "--json-summary"])
        .output()?;
    assert!(output.status.success(), "{output:?}");
    let stdout = stdout_of(&output);
    assert!(stdout.contains("Starting employee normalization migration on DB: hris"));
    assert!(stdout.contains("Migrated _id: 000000000000000000aaaaaa"));
    assert!(stdout.contains("Created/updated documents: 1"));
    assert!(stdout.contains("Generated/filled employee_id for documents: 1"));
    assert!(stdout.contains("Index created or already present."));
    assert!(stdout.contains("Migration complete."));

    let summary: Value = stdout
        .lines()
        .find(|line| line.starts_with('{'))
        .map(serde_json::from_str)
        .expect("summary line")?;
    assert_eq!(summary["type"], "summary");
    assert_eq!(summary["renamed"], 1);
    assert_eq!(summary["generated"], 1);
    assert_eq!(summary["index"]["status"], "created");

    let output = normalize()
        .args(["--db", db.to_str().unwrap(), "verify"])
        .output()?;
    assert!(output.status.success(), "{output:?}");
    Ok(())
}

#[tokio::test]
async fn second_run_reports_zero_changes() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("hris.sqlite3");
    seed(&db, "employees", &[("a1", json!({"hiredate": "2020-01-01"}))]).await?;

    normalize()
        .args(["--db", db.to_str().unwrap(), "run"])
        .assert()
        .success();
    let output = normalize()
        .args(["--db", db.to_str().unwrap(), "run"])
        .output()?;
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("Created/updated documents: 0"));
    assert!(stdout.contains("Generated/filled employee_id for documents: 0"));
    Ok(())
}

#[tokio::test]
async fn index_conflict_is_a_warning_not_a_failure() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("hris.sqlite3");
    seed(
        &db,
        "employees",
        &[
            ("d1", json!({"employee_id": "E1"})),
            ("d2", json!({"employee_id": "E1"})),
        ],
    )
    .await?;

    let output = normalize()
        .args(["--db", db.to_str().unwrap(), "run"])
        .output()?;
    assert!(output.status.success(), "{output:?}");
    assert!(stdout_of(&output).contains("Index creation warning:"));

    let output = normalize()
        .args(["--db", db.to_str().unwrap(), "verify"])
        .output()?;
    assert_eq!(output.status.code(), Some(2));
    assert!(stdout_of(&output).contains("Duplicate employee_id:    1"));
    Ok(())
}

#[tokio::test]
async fn dry_run_leaves_database_untouched() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("hris.sqlite3");
    seed(&db, "people", &[("d1", json!({"legalname": "Jane"}))]).await?;

    let output = normalize()
        .args([
            "--db",
            db.to_str().unwrap(),
            "--collection",
            "people",
            "run",
            "--dry-run",
        ])
        .output()?;
    assert!(output.status.success(), "{output:?}");
    let stdout = stdout_of(&output);
    assert!(stdout.contains("Dry run: no documents will be written."));
    assert!(stdout.contains("Index creation skipped (dry run)."));

    let output = normalize()
        .args([
            "--db",
            db.to_str().unwrap(),
            "--collection",
            "people",
            "verify",
            "--json",
        ])
        .output()?;
    assert_eq!(output.status.code(), Some(2));
    let report: Value = serde_json::from_str(stdout_of(&output).trim())?;
    assert_eq!(report["legacy_leftovers"][0]["field"], "legalname");
    Ok(())
}

#[test]
fn missing_database_is_an_error() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("absent.sqlite3");
    let output = normalize()
        .args(["--db", db.to_str().unwrap(), "run"])
        .output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Database not found"));
    assert!(!db.exists());
    Ok(())
}

#[test]
fn invalid_collection_is_rejected() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("hris.sqlite3");
    let output = normalize()
        .args(["--db", db.to_str().unwrap(), "--collection", "bad name", "verify"])
        .output()?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not a plain identifier"));
    Ok(())
}

#[tokio::test]
async fn data_dir_and_db_name_locate_the_database() -> anyhow::Result<()> {
    let dir = tempdir()?;
    seed(
        &dir.path().join("staging.sqlite3"),
        "employees",
        &[("d1", json!({"employee_id": "E1"}))],
    )
    .await?;

    let output = normalize()
        .env("HRIS_DATA_DIR", dir.path())
        .args(["--db-name", "staging", "run", "--id-strategy", "uuid"])
        .output()?;
    assert!(output.status.success(), "{output:?}");
    assert!(stdout_of(&output).contains("migration on DB: staging"));
    Ok(())
}
