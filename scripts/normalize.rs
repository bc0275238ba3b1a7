use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use hris_normalize::{
    config::MigrationConfig,
    logging,
    migration::{IdentifierSource, IndexReport, Phase},
    run_migration,
    verify::{check_invariants, format_human_summary},
    AppError, DocumentStore, IdStrategy, MigrationOptions, MigrationSummary, ProgressEvent,
};
use serde_json::json;
use std::{path::PathBuf, sync::Arc};

#[derive(Parser)]
#[command(name = "normalize", about = "Normalize legacy employee documents")]
struct Cli {
    /// Explicit database file (overrides --data-dir/--db-name)
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,

    #[arg(long, value_name = "NAME", global = true)]
    db_name: Option<String>,

    #[arg(long, value_name = "NAME", global = true)]
    collection: Option<String>,

    #[arg(long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Rename legacy fields, backfill employee_id and ensure its unique index")]
    Run(RunArgs),
    #[command(about = "Check that every employee has a unique employee_id and no legacy fields")]
    Verify(VerifyArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Report what would change without writing
    #[arg(long)]
    dry_run: bool,

    /// Also print a one-line JSON summary
    #[arg(long)]
    json_summary: bool,

    #[arg(long, value_enum, value_name = "STRATEGY")]
    id_strategy: Option<IdStrategy>,
}

#[derive(Args)]
struct VerifyArgs {
    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    let mut config = MigrationConfig::from_env().map_err(AppError::from)?;
    if let Some(path) = cli.db {
        config.db_path = Some(path);
    }
    if let Some(name) = cli.db_name {
        config.db_name = name;
    }
    if let Some(name) = cli.collection {
        config.collection_name = name;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Command::Run(args) => {
            if let Some(strategy) = args.id_strategy {
                config.id_strategy = strategy;
            }
            run(&config, args).await
        }
        Command::Verify(args) => verify(&config, args).await,
    }
}

async fn open_store(config: &MigrationConfig) -> Result<DocumentStore> {
    config.validate().map_err(AppError::from)?;
    let store = DocumentStore::open(&config.database_path(), &config.collection_name)
        .await
        .map_err(|err| anyhow!(format_cli_error(&err)))?;
    Ok(store)
}

async fn run(config: &MigrationConfig, args: RunArgs) -> Result<()> {
    let store = open_store(config).await?;
    let generator = config.id_strategy.generator();

    println!(
        "Starting employee normalization migration on DB: {}",
        config.db_name
    );
    if args.dry_run {
        println!("Dry run: no documents will be written.");
    }

    let progress: Arc<dyn Fn(&ProgressEvent) + Send + Sync> = Arc::new(print_progress);
    let summary = run_migration(
        &store,
        &MigrationOptions {
            dry_run: args.dry_run,
        },
        generator.as_ref(),
        Some(progress),
    )
    .await;
    store.close().await;
    let summary = summary.map_err(|err| anyhow!(format_cli_error(&err)))?;

    if args.json_summary {
        emit_summary_event(&summary);
    }
    Ok(())
}

fn print_progress(event: &ProgressEvent) {
    match event {
        ProgressEvent::Started { .. } => {}
        ProgressEvent::PhaseStarted(Phase::Rename) => {}
        ProgressEvent::PhaseStarted(Phase::Backfill) => {
            println!("Ensuring all docs have employee_id (generating where missing)...")
        }
        ProgressEvent::PhaseStarted(Phase::Index) => {
            println!("Creating (unique) index on employee_id (partial to avoid nulls)...")
        }
        ProgressEvent::DocumentMigrated { id } => println!("Migrated _id: {id}"),
        ProgressEvent::IdentifierFilled {
            id,
            employee_id,
            source,
        } => {
            let how = match source {
                IdentifierSource::Legacy => "filled",
                IdentifierSource::Generated => "generated",
            };
            println!("{how} employee_id {employee_id} for _id: {id}");
        }
        ProgressEvent::PhaseFinished {
            phase: Phase::Rename,
            count,
        } => println!("Created/updated documents: {count}"),
        ProgressEvent::PhaseFinished {
            phase: Phase::Backfill,
            count,
        } => println!("Generated/filled employee_id for documents: {count}"),
        ProgressEvent::PhaseFinished { .. } => {}
        ProgressEvent::IndexWarning(err) => println!("Index creation warning: {err}"),
        ProgressEvent::IndexEnsured(IndexReport::Skipped) => {
            println!("Index creation skipped (dry run).")
        }
        ProgressEvent::IndexEnsured(_) => println!("Index created or already present."),
        ProgressEvent::Completed => println!("Migration complete."),
    }
}

fn emit_summary_event(summary: &MigrationSummary) {
    let event = json!({
        "type": "summary",
        "collection": summary.collection,
        "renamed": summary.renamed,
        "filled_from_legacy": summary.filled_from_legacy,
        "generated": summary.generated,
        "backfilled": summary.backfilled,
        "index": summary.index,
        "dry_run": summary.dry_run,
        "elapsed_ms": summary.elapsed_ms,
    });
    println!("{}", event);
}

async fn verify(config: &MigrationConfig, args: VerifyArgs) -> Result<()> {
    let store = open_store(config).await?;
    let report = check_invariants(&store).await;
    store.close().await;
    let report = report.map_err(|err| anyhow!(format_cli_error(&err)))?;

    if args.json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("{}", format_human_summary(&report));
        if report.is_clean() {
            println!("✅ All employee documents are normalized");
        } else {
            println!("❌ Employee documents still need attention");
        }
    }

    if !report.is_clean() {
        std::process::exit(2);
    }
    Ok(())
}

fn format_cli_error(err: &AppError) -> String {
    match err.code() {
        "STORE/NOT_FOUND" => match err.context().get("path") {
            Some(path) => format!("Database not found at {path}. Pass --db or set HRIS_DB_PATH."),
            None => err.message().to_string(),
        },
        "DOC/MALFORMED" => match err.context().get("document_id") {
            Some(id) => format!("Document {id} is malformed: {}", err.message()),
            None => err.message().to_string(),
        },
        _ => err.to_string(),
    }
}
