//! best-pools — rank Uniswap V3 pools and post the leaderboard to Telegram
//!
//! Usage:
//!   best-pools                      — fetch, rank, and send the report
//!   best-pools --dry-run            — print the report instead of sending it
//!   best-pools --json               — print the full ranked table as JSON

mod settings;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use engine::{build_leaderboard, run, Delivery, SubgraphClient, TelegramClient};
use tracing::{info, warn};

use crate::settings::Settings;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "best-pools")]
#[command(about = "Rank Uniswap V3 pools by fee yield and post the top ones to Telegram", long_about = None)]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the report to stdout instead of sending it
    #[arg(long)]
    dry_run: bool,

    /// Print the full ranked table as JSON (implies --dry-run)
    #[arg(long)]
    json: bool,

    /// Number of pools in the report (overrides `report_size`)
    #[arg(long)]
    top: Option<usize>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug,engine=debug,best_pools=debug")
        } else {
            EnvFilter::new("info,engine=info,best_pools=info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let dry_run = cli.dry_run || cli.json;

    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    if let Some(top) = cli.top {
        settings.report_size = top;
    }
    settings
        .validate(!dry_run)
        .context("Invalid configuration")?;

    info!(version = APP_VERSION, top_pools = settings.top_pools, "best-pools starting");

    let timeout = Duration::from_secs(settings.request_timeout_secs);
    let subgraph = SubgraphClient::new(&settings.subgraph_url, timeout);
    let options = settings.run_options();

    if dry_run {
        let leaderboard = build_leaderboard(&subgraph, &options, Utc::now())
            .await
            .context("Failed to build leaderboard")?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&leaderboard.ranked)?);
        } else {
            match leaderboard.report {
                Some(report) => println!("{}", report),
                None => println!("No pools with daily history in the lookback window"),
            }
        }
        return Ok(());
    }

    let telegram = TelegramClient::new(
        &settings.telegram_api_url,
        &settings.bot_token,
        &settings.chat_id,
        timeout,
    );
    let summary = run(&subgraph, &telegram, &options, Utc::now())
        .await
        .context("Run aborted")?;

    match summary.delivery {
        Some(Delivery::Sent) => info!(
            fetched = summary.pools_fetched,
            ranked = summary.pools_ranked,
            "Leaderboard sent"
        ),
        Some(Delivery::Fallback) => {
            warn!("Leaderboard rejected by Telegram, rejection message sent instead")
        }
        Some(Delivery::Lost) => warn!("Leaderboard could not be delivered"),
        None => warn!(fetched = summary.pools_fetched, "No pools ranked, nothing sent"),
    }

    Ok(())
}
