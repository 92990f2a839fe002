//! Command line entry point for ragwatch.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use ragwatch_watcher::{bulk_ingest, IngestNotifier, WatchConfig, WatchService};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ragwatch",
    about = "Watch a directory tree and report file changes to an ingestion endpoint"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch a directory and stream change notifications until interrupted.
    Watch(ServiceArgs),

    /// Walk the tree once and report every non-excluded file as created.
    Ingest(ServiceArgs),
}

#[derive(Args)]
struct ServiceArgs {
    /// Directory tree to observe.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Ignore-pattern file, absolute or relative to the root.
    #[arg(long, default_value = ".ragignore")]
    ignore_file: PathBuf,

    /// Ingestion endpoint receiving notification batches.
    #[arg(long, default_value = "http://localhost:8000/ingest/notify")]
    endpoint: String,

    /// Project identifier stamped on every batch.
    #[arg(long, default_value = "default")]
    project_id: String,

    /// Seconds between ignore-file polls.
    #[arg(long, default_value_t = 2)]
    poll_interval: u64,
}

impl ServiceArgs {
    fn into_config(self) -> WatchConfig {
        WatchConfig::new(self.root, self.endpoint, self.project_id)
            .with_ignore_file(self.ignore_file)
            .with_poll_interval(Duration::from_secs(self.poll_interval))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Watch(args) => {
            let mut service = WatchService::new(args.into_config());
            service.start().await?;
            tokio::signal::ctrl_c().await?;
            info!("shutting down");
            service.stop().await;
        }
        Command::Ingest(args) => {
            let config = args.into_config();
            let notifier = IngestNotifier::new(config.endpoint.clone());
            let count = bulk_ingest(&config, &notifier).await?;
            info!("reported {count} file(s)");
        }
    }

    Ok(())
}
