use anyhow::Context;
use api_client::{CurrencyLayerClient, FxClient, MockFxClient};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use configuration::{ChunkFailurePolicy, DatabaseSettings, Settings, init_tracing, load_config};
use core_types::FxRate;
use database::{DatabaseService, DbError, FutureExt, PoolSettings};
use ingestion::{IngestOptions, IngestReport, ingest_file};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// The main entry point for the dbal command-line tool.
#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; settings also come from dbal.toml and DBAL__* variables.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "Command failed.");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Transactional loading of billing usage data and historical FX rates.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML settings file (default: ./dbal.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `database.url` (e.g. "sqlite:///data/dbal.db", "postgres://...").
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the usage_data and fx_rates tables if they do not exist.
    InitSchema,
    /// Load a usage CSV file into usage_data.
    Ingest(IngestArgs),
    /// Fetch historical FX rates and store them in fx_rates.
    FetchRates(FetchRatesArgs),
    /// Show the backend, pool occupancy and row counts.
    Status,
}

#[derive(Parser)]
struct IngestArgs {
    /// The CSV file to load.
    #[arg(long)]
    file: PathBuf,

    /// Records per transactional chunk.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// What to do when a chunk cannot be committed.
    #[arg(long, value_enum)]
    on_chunk_failure: Option<ChunkFailurePolicy>,
}

#[derive(Parser)]
struct FetchRatesArgs {
    /// The historical date (format: YYYY-MM-DD).
    #[arg(long)]
    date: NaiveDate,

    /// Currency codes, space or comma separated (e.g. "EUR ILS" or "EUR,ILS").
    #[arg(long, required = true, num_args = 1.., value_delimiter = ',')]
    currencies: Vec<String>,

    /// Use fixed offline rates instead of the live provider.
    #[arg(long)]
    mock: bool,
}

// ==============================================================================
// Command Dispatch
// ==============================================================================

/// Returns `Ok(false)` when the command ran but did not fully succeed.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut settings = load_config(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(url) = cli.database_url {
        settings.database.url = url;
    }
    let _guard = init_tracing(&settings.logging)?;

    let service = database::connect(&settings.database.url, &pool_settings(&settings.database))
        .await
        .context("Failed to open the database")?;

    let outcome = match cli.command {
        Commands::InitSchema => handle_init_schema(&service).await,
        Commands::Ingest(args) => handle_ingest(args, &settings, &service).await,
        Commands::FetchRates(args) => handle_fetch_rates(args, &settings, &service).await,
        Commands::Status => handle_status(&service).await,
    };

    service.close().await;
    outcome
}

fn pool_settings(settings: &DatabaseSettings) -> PoolSettings {
    PoolSettings {
        capacity: settings.pool_size,
        acquire_timeout: settings.acquire_timeout(),
        busy_timeout: settings.sqlite_busy_timeout(),
    }
}

async fn handle_init_schema(service: &DatabaseService) -> anyhow::Result<bool> {
    ingestion::ensure_schema(service)
        .await
        .context("Failed to create usage_data")?;
    rate_store::ensure_schema(service)
        .await
        .context("Failed to create fx_rates")?;
    info!(backend = %service.backend_kind(), "Schema is up to date.");
    println!("Schema ready on {}.", service.backend_kind());
    Ok(true)
}

// ==============================================================================
// Ingest Command Logic
// ==============================================================================

async fn handle_ingest(
    args: IngestArgs,
    settings: &Settings,
    service: &DatabaseService,
) -> anyhow::Result<bool> {
    let mut options = IngestOptions::from(&settings.ingest);
    if let Some(chunk_size) = args.chunk_size {
        options.chunk_size = chunk_size;
    }
    if let Some(policy) = args.on_chunk_failure {
        options.on_chunk_failure = policy;
    }

    let report = ingest_file(service, &args.file, &options)
        .await
        .with_context(|| format!("Failed to ingest {}", args.file.display()))?;

    print_ingest_report(&report);
    Ok(report.is_success())
}

fn print_ingest_report(report: &IngestReport) {
    let mut summary = Table::new();
    summary.load_preset(UTF8_FULL).set_header(vec!["Metric", "Value"]);
    summary.add_row(vec!["Rows read".to_string(), report.rows_read.to_string()]);
    summary.add_row(vec!["Rows written".to_string(), report.rows_written.to_string()]);
    summary.add_row(vec!["Rows skipped".to_string(), report.rows_skipped.to_string()]);
    summary.add_row(vec!["Rows failed".to_string(), report.rows_failed().to_string()]);
    summary.add_row(vec![
        "Chunks committed".to_string(),
        report.chunks_committed.to_string(),
    ]);
    summary.add_row(vec![
        "Chunks failed".to_string(),
        report.failed_chunks.len().to_string(),
    ]);
    println!("{summary}");

    if !report.skipped.is_empty() {
        let mut skipped = Table::new();
        skipped.load_preset(UTF8_FULL).set_header(vec!["Line", "Reason"]);
        for row in &report.skipped {
            skipped.add_row(vec![row.line.to_string(), row.error.to_string()]);
        }
        println!("Skipped rows (first {} shown):", report.skipped.len());
        println!("{skipped}");
    }

    if !report.failed_chunks.is_empty() {
        let mut failed = Table::new();
        failed
            .load_preset(UTF8_FULL)
            .set_header(vec!["Chunk", "Lines", "Rows", "Attempts", "Error"]);
        for chunk in &report.failed_chunks {
            failed.add_row(vec![
                (chunk.chunk + 1).to_string(),
                format!("{}-{}", chunk.first_line, chunk.last_line),
                chunk.rows.to_string(),
                chunk.attempts.to_string(),
                chunk.error.clone(),
            ]);
        }
        println!("Failed chunks (rerun the file to retry them):");
        println!("{failed}");
    }

    if let Some(reason) = &report.aborted {
        println!("Run stopped early: {reason}");
    }
}

// ==============================================================================
// Fetch-Rates Command Logic
// ==============================================================================

async fn handle_fetch_rates(
    args: FetchRatesArgs,
    settings: &Settings,
    service: &DatabaseService,
) -> anyhow::Result<bool> {
    let client: Box<dyn FxClient> = if args.mock {
        Box::new(MockFxClient)
    } else {
        let api_key = settings
            .fx
            .api_key
            .clone()
            .context("No provider API key; set fx.api_key or CURRENCY_LAYER_API_KEY")?;
        Box::new(CurrencyLayerClient::new(&settings.fx, api_key)?)
    };

    rate_store::ensure_schema(service)
        .await
        .context("Failed to create fx_rates")?;
    rate_store::sync_rates(client.as_ref(), service, args.date, &args.currencies)
        .await
        .with_context(|| format!("Failed to sync rates for {}", args.date))?;

    let stored = rate_store::load_rates(service, args.date).await?;
    print_rates(args.date, &stored);
    Ok(true)
}

fn print_rates(date: NaiveDate, rates: &[FxRate]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Currency", "Rate to base", "Fetched at"]);
    for rate in rates {
        table.add_row(vec![
            rate.currency.clone(),
            rate.rate_to_base.to_string(),
            rate.fetched_at
                .map(|ts| ts.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("Rates stored for {date}:");
    println!("{table}");
}

// ==============================================================================
// Status Command Logic
// ==============================================================================

async fn handle_status(service: &DatabaseService) -> anyhow::Result<bool> {
    let pool = service.pool_status();
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Item", "Value"]);
    table.add_row(vec!["Backend".to_string(), service.backend_kind().to_string()]);
    table.add_row(vec!["Pool capacity".to_string(), pool.capacity.to_string()]);
    table.add_row(vec!["Connections open".to_string(), pool.open.to_string()]);
    table.add_row(vec!["Connections idle".to_string(), pool.idle.to_string()]);
    table.add_row(vec!["Connections in use".to_string(), pool.in_use().to_string()]);

    for name in ["usage_data", "fx_rates"] {
        let count = match count_rows(service, name).await {
            Ok(n) => n.to_string(),
            Err(e) => {
                info!(table = name, error = %e, "Row count unavailable.");
                "not created".to_string()
            }
        };
        table.add_row(vec![format!("Rows in {name}"), count]);
    }

    println!("{table}");
    Ok(true)
}

async fn count_rows(service: &DatabaseService, table: &'static str) -> Result<i64, DbError> {
    let rows = service
        .run_in_transaction(move |tx| {
            async move {
                tx.execute(&format!("SELECT COUNT(*) AS n FROM {table}"), &[])
                    .await
            }
            .boxed()
        })
        .await?;
    Ok(rows
        .first()
        .and_then(|row| row.get("n"))
        .and_then(|value| value.as_i64())
        .unwrap_or(0))
}
