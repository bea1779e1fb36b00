use anyhow::Context;
use clap::Parser;
use es_indexer::{Config, Indexer, intake};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Buffers inbound event records from stdin and bulk-indexes them into
/// the configured Elasticsearch-compatible destinations.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the YAML or JSON configuration file
    #[arg(short, long, default_value = "es-indexer.yaml")]
    config: PathBuf,
}

fn setup_logging() {
    let filter = EnvFilter::try_from_env("ES_INDEXER_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging();
    let args = Args::parse();

    // 1. Load and validate config; any error here aborts startup
    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;
    let indexer = Indexer::from_config(&config).context("invalid indexer configuration")?;

    // 2. Start the flush timer
    let scheduler = Arc::new(indexer).start();
    info!("started es-indexer");

    // 3. Feed stdin into the queue until EOF or Ctrl-C
    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = intake::read_records(stdin, scheduler.indexer()) => {
            match result {
                Ok(summary) => info!(
                    accepted = summary.accepted,
                    rejected = summary.rejected,
                    "input closed"
                ),
                Err(err) => warn!(error = %err, "failed reading input"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received");
        }
    }

    // 4. Final drain, then close the destination clients
    scheduler.shutdown().await;
    info!("stopped es-indexer");

    Ok(())
}
