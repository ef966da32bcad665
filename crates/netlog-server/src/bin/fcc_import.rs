// FCC ULS import binary
//
// Runs one import job to completion in this process: every continuation the
// job dispatches is drained from the local queue instead of going over HTTP.
//
// Usage:
//   fcc-import --job-id nightly-2026-02-01 --data-type ALL
//
// Reads DATABASE_URL and the FCC_* / S3_* / LOG_* variables like the server.

use anyhow::{Context, Result};
use clap::Parser;
use netlog_common::logging::{init_logging, LogConfig};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use netlog_server::ingest::{
    fcc::InvocationOutcome, DataType, FccImportConfig, FccImportJob, ImportWorker,
};

#[derive(Debug, Parser)]
#[command(name = "fcc-import", about = "Import the FCC ULS amateur licence database")]
struct Args {
    /// Job identifier recorded in fcc_import_jobs (random if omitted)
    #[arg(long, env = "FCC_JOB_ID")]
    job_id: Option<String>,

    /// Record types to import: AM, EN or ALL
    #[arg(long, default_value = "ALL")]
    data_type: DataType,

    /// Source archive URL (overrides FCC_SOURCE_URL)
    #[arg(long)]
    source_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    let log_config = LogConfig::builder()
        .log_file_prefix("fcc-import")
        .filter_directives("netlog_server=info,sqlx=warn")
        .build()
        .merge_env()?;
    init_logging(&log_config)?;

    let mut config = FccImportConfig::from_env()?;
    // Continuations must come back to this process
    config.continuation_url = None;
    if let Some(url) = args.source_url {
        config.source_url = url;
    }
    config.validate()?;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    let db = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("../../migrations")
        .run(&db)
        .await
        .context("Failed to run migrations")?;

    let job_id = args
        .job_id
        .unwrap_or_else(|| format!("cli-{}", uuid::Uuid::new_v4()));
    info!(job_id = %job_id, data_type = %args.data_type, source = %config.source_url, "Starting FCC import");

    let (mut worker, _queue) = ImportWorker::from_config(config, db).await?;
    let outcome = worker
        .run_to_completion(FccImportJob::new(&job_id, args.data_type))
        .await
        .with_context(|| format!("FCC import {} failed", job_id))?;

    if let InvocationOutcome::Completed { processed_records } = outcome {
        info!(job_id = %job_id, processed_records, "FCC import complete");
    }

    Ok(())
}
