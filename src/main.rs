use anyhow::Context;
use api_client::YahooFinanceClient;
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use configuration::{Settings, StorageBackend};
use core_types::JobStatus;
use database::{AnalysisResult, DbRepository, InMemoryJobStore, InMemoryResultStore, JobStore, ResultStore};
use indicatif::{ProgressBar, ProgressStyle};
use orchestrator::{JobOrchestrator, WorkerPool};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use web_server::AppState;

/// The main entry point for the MarketLens analysis service.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file, if there is one.
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Execute the appropriate command
    match cli.command {
        Commands::Serve(args) => handle_serve(args).await,
        Commands::Analyze(args) => handle_analyze(args).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Asynchronous market analytics: start a job, poll it, fetch the report.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP job API.
    Serve(ServeArgs),
    /// Run a single analysis in-process and print its summary.
    Analyze(AnalyzeArgs),
}

#[derive(Parser)]
struct ServeArgs {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides `storage.backend` from the configuration.
    #[arg(long, value_enum)]
    storage: Option<StorageBackend>,
}

#[derive(Parser)]
struct AnalyzeArgs {
    /// The ticker to analyze (e.g., "AAPL", "BRK.B").
    #[arg(long)]
    symbol: String,

    /// The lookback window: 1M, 3M, 6M, 1Y or 5Y.
    #[arg(long, default_value = "1Y")]
    range: String,

    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Print the full result document as JSON instead of the summary table.
    #[arg(long)]
    json: bool,
}

// ==============================================================================
// Wiring
// ==============================================================================

async fn build_stores(settings: &Settings) -> anyhow::Result<(Arc<dyn JobStore>, Arc<dyn ResultStore>)> {
    match settings.storage.backend {
        StorageBackend::Postgres => {
            let pool = database::connect(&settings.database).await?;
            database::run_migrations(&pool).await?;
            let repo = Arc::new(DbRepository::new(pool));
            let jobs: Arc<dyn JobStore> = repo.clone();
            let results: Arc<dyn ResultStore> = repo;
            Ok((jobs, results))
        }
        StorageBackend::Memory => {
            tracing::info!("Using in-memory storage; jobs and results are lost on restart.");
            let jobs: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
            let results: Arc<dyn ResultStore> = Arc::new(InMemoryResultStore::new());
            Ok((jobs, results))
        }
    }
}

fn build_orchestrator(
    settings: &Settings,
    jobs: Arc<dyn JobStore>,
    results: Arc<dyn ResultStore>,
) -> anyhow::Result<JobOrchestrator> {
    let market_data = YahooFinanceClient::new(&settings.market_data)?;
    let pool = Arc::new(WorkerPool::new(settings.worker_pool.clone()));
    Ok(JobOrchestrator::new(jobs, results, Arc::new(market_data), pool))
}

// ==============================================================================
// Serve Command Logic
// ==============================================================================

async fn handle_serve(args: ServeArgs) -> anyhow::Result<()> {
    let settings = match args.storage {
        Some(backend) => {
            configuration::load_config_with_overrides(&args.config, &[("storage.backend", backend.as_str())])
        }
        None => configuration::load_config(&args.config),
    }
    .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;
    let _log_guard = configuration::init_tracing(&settings.logging)?;

    tracing::info!(
        storage = settings.storage.backend.as_str(),
        core_workers = settings.worker_pool.core_workers,
        max_workers = settings.worker_pool.max_workers,
        queue_capacity = settings.worker_pool.queue_capacity,
        "Starting MarketLens."
    );

    let (jobs, results) = build_stores(&settings).await?;
    let orchestrator = build_orchestrator(&settings, jobs, results)?;
    let state = Arc::new(AppState {
        orchestrator: orchestrator.clone(),
        server: settings.server.clone(),
    });

    let addr = settings.server.socket_addr()?;
    web_server::run_server(state, addr, shutdown_signal()).await?;

    tracing::info!(grace = ?settings.worker_pool.shutdown_grace, "Draining analysis jobs.");
    if !orchestrator.shutdown().await {
        tracing::warn!("Some analysis jobs were still running at exit.");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for the shutdown signal.");
        return;
    }
    tracing::info!("Shutdown signal received.");
}

// ==============================================================================
// Analyze Command Logic
// ==============================================================================

async fn handle_analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    // Logs would tear the progress bar; RUST_LOG still overrides this level.
    let settings = configuration::load_config_with_overrides(
        &args.config,
        &[("storage.backend", "memory"), ("logging.level", "warn")],
    )?;
    let _log_guard = configuration::init_tracing(&settings.logging)?;

    let (jobs, results) = build_stores(&settings).await?;
    let orchestrator = build_orchestrator(&settings, jobs, results)?;
    let job = orchestrator.create_job(&args.symbol, &args.range).await?;

    let progress_bar = ProgressBar::new(100);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("#>-"),
    );
    progress_bar.set_message(format!("{} {}", job.symbol, job.range));

    let finished = loop {
        let current = orchestrator.get_job(job.id).await?;
        progress_bar.set_position(u64::from(current.progress));
        if current.is_terminal() {
            break current;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    };
    orchestrator.shutdown().await;

    match finished.status {
        JobStatus::Completed => {
            progress_bar.finish_with_message(format!("{} {} done", finished.symbol, finished.range));
            let result = orchestrator.get_result(finished.id).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", summary_table(&result));
            }
            Ok(())
        }
        _ => {
            progress_bar.abandon_with_message(format!("{} {} failed", finished.symbol, finished.range));
            anyhow::bail!(
                "Analysis failed: {}",
                finished.error_message.unwrap_or_else(|| "unknown error".to_string())
            )
        }
    }
}

fn summary_table(result: &AnalysisResult) -> Table {
    let summary = &result.summary;
    let first_and_last = result
        .series
        .prices
        .first()
        .zip(result.series.prices.last())
        .map(|(first, last)| format!("{} .. {}", first.date, last.date))
        .unwrap_or_default();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["Symbol".to_string(), result.symbol.clone()]);
    table.add_row(vec!["Range".to_string(), result.range.to_string()]);
    table.add_row(vec!["Trading days".to_string(), result.series.prices.len().to_string()]);
    table.add_row(vec!["Period".to_string(), first_and_last]);
    table.add_row(vec!["Cumulative return".to_string(), format!("{:.2}%", summary.cumulative_return * 100.0)]);
    table.add_row(vec!["Max drawdown".to_string(), format!("{:.2}%", summary.max_drawdown * 100.0)]);
    table.add_row(vec![
        "Volatility (30d, annualized)".to_string(),
        format!("{:.2}%", summary.latest_volatility * 100.0),
    ]);
    table.add_row(vec!["RSI (14)".to_string(), format!("{:.1}", summary.latest_rsi)]);
    table.add_row(vec!["Generated at".to_string(), result.generated_at.to_rfc3339()]);
    table
}
