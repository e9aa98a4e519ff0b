use clap::{Parser, Subcommand};
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fng_dashboard::config::AppConfig;
use fng_dashboard::storage_utils::AsyncStorageManager;
use fng_dashboard::{build_service, report, tui};

#[derive(Parser)]
#[command(name = "fng-dashboard", version, about = "Coin price vs. fear & greed index dashboard")]
struct Cli {
    /// Backend base URL (overrides the config file)
    #[arg(long)]
    base_url: Option<String>,

    /// Config file name inside the storage directory, without `.json`
    #[arg(long, default_value = "config")]
    config: String,

    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Directory `data.csv` is saved to
    #[arg(long)]
    download_dir: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive dashboard (default)
    Tui,
    /// Fetch once and print a table
    Report {
        /// Coin name as listed by the backend, e.g. "Bitcoin"
        #[arg(long)]
        coin: Option<String>,
        /// Days of history ending now
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(i64).range(1..=36_500))]
        days: i64,
        /// Also download data.csv
        #[arg(long)]
        csv: bool,
    },
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fng_dashboard=info"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let storage = AsyncStorageManager::new_relative("storage").await?;
    let command = cli.command.unwrap_or(Command::Tui);

    // The TUI owns the terminal, so its logs go to a file.
    match command {
        Command::Tui => {
            let log_file = std::fs::File::create(storage.base_dir.join("fng-dashboard.log"))?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(Mutex::new(log_file))
                .with_ansi(false)
                .with_target(true)
                .init();
        }
        Command::Report { .. } => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(std::io::stderr)
                .with_target(true)
                .init();
        }
    }

    let mut config = AppConfig::load_or_default(&storage, &cli.config).await?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(timeout_secs) = cli.timeout_secs {
        config.timeout_secs = timeout_secs;
    }
    if let Some(download_dir) = cli.download_dir {
        config.download_dir = download_dir;
    }
    info!(base_url = %config.base_url, timeout_secs = config.timeout_secs, "starting");

    let service = build_service(&config).await?;

    match command {
        Command::Tui => tui::run_tui(Arc::new(service)).await,
        Command::Report { coin, days, csv } => {
            report::run(&service, report::ReportOptions { coin, days, csv }).await
        }
    }
}
