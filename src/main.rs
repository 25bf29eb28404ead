use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use price_drop_watcher::config::{AppConfig, LoggingConfig};
use price_drop_watcher::fetch::build_fetcher;
use price_drop_watcher::plugins::transports::{DryRunTransport, TelegramTransport};
use price_drop_watcher::plugins::{ChatTransport, RetailerRegistry};
use price_drop_watcher::price::format_amount;
use price_drop_watcher::scheduler::CycleScheduler;
use price_drop_watcher::store::{MemoryBackend, SqliteBackend};
use price_drop_watcher::{CycleOrchestrator, PriceExtractor, ProductStore};

#[derive(Parser)]
#[command(name = "price-drop-watcher", version, about = "Track product prices and alert on drops")]
struct Cli {
    /// Use an in-memory store and log alerts instead of sending them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one ingest/refresh/alert cycle and exit
    Run,
    /// Run cycles on the configured cron schedule until interrupted
    Schedule,
    /// Print the watchlist
    List,
    /// Extract one product page and print the result
    Check { url: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    let _guard = init_tracing(&config.logging);

    match run(cli, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("price_drop_watcher=info"));

    let (file_layer, guard) = match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &logging.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    guard
}

/// `Ok(false)` when the command ran but reported a failed phase.
async fn run(cli: Cli, config: AppConfig) -> Result<bool> {
    let store = open_store(&config, cli.dry_run).await?;
    let registry = RetailerRegistry::with_default_retailers().await;
    let fetcher = build_fetcher(&config.scraper)?;
    info!("Fetching pages via {}", fetcher.name());
    let extractor = Arc::new(PriceExtractor::new(fetcher, registry));

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let orchestrator = CycleOrchestrator::new(&config, store, transport(&config, cli.dry_run)?, extractor);
            let report = orchestrator.run_cycle().await?;
            info!(
                "Cycle {}: {} updated, {} failed, {} alert(s)",
                report.id,
                report.refresh.updated,
                report.refresh.failed,
                report.alerts()
            );
            if let Some(failure) = report.failure() {
                tracing::error!("Cycle {} failed: {}", report.id, failure);
            }
            Ok(report.is_success())
        }
        Command::Schedule => {
            let orchestrator = Arc::new(CycleOrchestrator::new(
                &config,
                store,
                transport(&config, cli.dry_run)?,
                extractor,
            ));
            let mut scheduler = CycleScheduler::new(orchestrator, config.scheduler.clone()).await?;
            scheduler.start().await?;

            tokio::signal::ctrl_c().await?;
            info!("Shutting down...");
            scheduler.shutdown().await?;
            Ok(true)
        }
        Command::List => {
            let records = store.list().await?;
            if records.is_empty() {
                println!("Watchlist is empty.");
            }
            for (i, record) in records.iter().enumerate() {
                let current = record
                    .current_price
                    .map(|p| format!("{}{}", config.alerts.currency_symbol, format_amount(p, 2)))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:>3}. [{}] {} | now {} | target {}{}\n     {}",
                    i + 1,
                    record.status,
                    record.display_name(),
                    current,
                    config.alerts.currency_symbol,
                    format_amount(record.target_price, 0),
                    record.url
                );
            }
            Ok(true)
        }
        Command::Check { url } => {
            let info = extractor
                .extract(url.trim())
                .await
                .with_context(|| format!("extraction failed for {url}"))?;
            println!(
                "{}\n{}{}",
                info.name.as_deref().unwrap_or("(no name found)"),
                config.alerts.currency_symbol,
                format_amount(info.price, 2)
            );
            Ok(true)
        }
    }
}

async fn open_store(config: &AppConfig, dry_run: bool) -> Result<ProductStore> {
    if dry_run {
        info!("Dry run: using in-memory store");
        return Ok(ProductStore::new(Arc::new(MemoryBackend::new())));
    }
    let backend = SqliteBackend::connect(&config.database)
        .await
        .with_context(|| format!("could not open {}", config.database.url))?;
    Ok(ProductStore::new(Arc::new(backend)))
}

fn transport(config: &AppConfig, dry_run: bool) -> Result<Arc<dyn ChatTransport>> {
    let telegram: Arc<dyn ChatTransport> = Arc::new(TelegramTransport::new(&config.telegram)?);
    if dry_run {
        return Ok(Arc::new(DryRunTransport::wrapping(telegram)));
    }
    Ok(telegram)
}
