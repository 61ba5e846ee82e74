mod config;
mod email;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::email::{EmailProvider, NoopProvider, ResendProvider};
use crate::pipeline::{Outcome, Pipeline};
use crate::scraper::http_client::HttpClient;
use crate::scraper::{CachedSource, ShareSansarFetcher};
use crate::storage::HistoryStore;

#[derive(Parser)]
#[command(name = "ipo-alert", about = "IPO opening monitor and notifier", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape the listing page and notify about a newly open IPO
    Run {
        /// Don't send emails or write the history file
        #[arg(long)]
        dry_run: bool,

        /// Notify even if this IPO is already in the history
        #[arg(long)]
        force: bool,

        /// Read the saved HTML cache instead of fetching the live page
        #[arg(long)]
        cached: bool,
    },

    /// Check config, source, history store and email provider
    Health,

    /// Show notification history statistics
    Stats,

    /// Drop history records older than the retention window
    Cleanup {
        /// Retention window in days
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "ipo_alert=info,warn",
        1 => "ipo_alert=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let code = match run_command(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn run_command(command: Command) -> Result<i32> {
    let config = AppConfig::load()?;

    match command {
        Command::Run {
            dry_run,
            force,
            cached,
        } => {
            let _t = utils::Timer::start("IPO alert cycle");

            // Dry runs never send, so they work without email credentials.
            let provider: Box<dyn EmailProvider> = if dry_run {
                Box::new(NoopProvider)
            } else {
                config.validate_for_sending()?;
                Box::new(ResendProvider::new(&config.email)?)
            };

            let store = HistoryStore::open(&config.storage.history_path);
            let pipeline = Pipeline::new(
                &store,
                provider.as_ref(),
                &config.email.recipients,
                dry_run,
            );

            let outcome = if cached {
                let source = CachedSource::new(&config.scraper.cache_path);
                pipeline.run(&source, force).await?
            } else {
                let source = ShareSansarFetcher::new(&config.scraper)?;
                pipeline.run(&source, force).await?
            };

            Ok(exit_code(&outcome))
        }

        Command::Health => Ok(run_health_checks(&config).await),

        Command::Stats => {
            let store = HistoryStore::open(&config.storage.history_path);
            let stats = store.stats();
            println!("─────────────────────────────────");
            println!("  IPO Alert — History Stats");
            println!("─────────────────────────────────");
            println!("  Notifications : {}", stats.total_notifications);
            println!("  First         : {}", stats.first_notified_at.as_deref().unwrap_or("—"));
            println!("  Last          : {}", stats.last_notified_at.as_deref().unwrap_or("—"));
            println!("  File size     : {} bytes", stats.file_size_bytes);
            println!("─────────────────────────────────");
            Ok(0)
        }

        Command::Cleanup { days } => {
            let store = HistoryStore::open(&config.storage.history_path);
            let removed = store.evict_older_than(days)?;
            println!("Removed {} record(s) older than {} days.", removed, days);
            Ok(0)
        }
    }
}

/// Per-subsystem pass/fail, covering everything a real run needs:
/// valid sending config, a reachable source page, a readable/writable
/// history store and a live email provider.
async fn run_health_checks(config: &AppConfig) -> i32 {
    let mut checks: Vec<(&str, Result<()>)> = Vec::new();

    checks.push(("config", config.validate_for_sending()));

    let store = HistoryStore::open(&config.storage.history_path);
    let store_ok = store.health_check();
    checks.push((
        "history store",
        if store_ok {
            Ok(())
        } else {
            Err(anyhow::anyhow!("{:?} is not readable/writable", store.path()))
        },
    ));

    let source_check = match HttpClient::new(&config.scraper) {
        Ok(client) => client
            .get_text(&config.scraper.source_url)
            .await
            .map(|_| ()),
        Err(e) => Err(e),
    };
    checks.push(("source page", source_check));

    let provider_check = match ResendProvider::new(&config.email) {
        Ok(provider) => provider.check_connection().await,
        Err(e) => Err(e),
    };
    checks.push(("email provider", provider_check));

    println!("─────────────────────────────────");
    println!("  IPO Alert — Health Check");
    println!("─────────────────────────────────");
    let mut all_ok = true;
    for (name, result) in &checks {
        match result {
            Ok(()) => println!("  OK      {}", name),
            Err(e) => {
                all_ok = false;
                println!("  FAILED  {}: {:#}", name, e);
            }
        }
    }
    println!("─────────────────────────────────");

    if all_ok { 0 } else { 1 }
}

/// Map the cycle outcome to a process exit code. Success-like outcomes
/// exit 0; total send failure exits 1; the sent-but-not-recorded
/// partial failure gets its own code so schedulers can alert on it.
fn exit_code(outcome: &Outcome) -> i32 {
    match outcome {
        Outcome::NoOpenIpo => {
            info!("No open IPO this cycle");
            0
        }
        Outcome::AlreadyNotified { company } => {
            info!("{}: already notified", company);
            0
        }
        Outcome::DryRun { company } => {
            info!("{}: dry run, nothing sent", company);
            0
        }
        Outcome::Sent {
            company,
            delivered,
            failed,
        } => {
            info!("{}: sent to {} recipient(s), {} failed", company, delivered, failed);
            0
        }
        Outcome::SendFailed { company } => {
            error!("{}: all sends failed", company);
            1
        }
        Outcome::SentNotRecorded { company, delivered } => {
            warn!(
                "{}: sent to {} recipient(s) but NOT recorded — check the history file",
                company, delivered
            );
            2
        }
    }
}
