// src/main.rs

//! sitewatch CLI
//!
//! Entry point for the site change monitor. `run` drives the scheduling
//! loop until interrupted; `check` evaluates every site once and exits.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use sitewatch::{
    config::Config,
    error::Result,
    fetch::{BrowserRenderer, HttpFetcher},
    notify::{LogNotifier, Notifier, WebhookNotifier},
    scheduler::Scheduler,
    server,
};

/// sitewatch - Web Page Change Monitor
#[derive(Parser, Debug)]
#[command(name = "sitewatch", version, about = "Monitors web pages for content changes")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the monitor loop until interrupted
    Run,

    /// Evaluate every site once, then exit
    Check,

    /// Validate the configuration file
    Validate,
}

type AppScheduler = Scheduler<HttpFetcher, BrowserRenderer, Box<dyn Notifier + Send + Sync>>;

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Wire the fetcher, renderer, and notification sink into a scheduler.
fn build_scheduler(config: Arc<Config>) -> Result<AppScheduler> {
    let fetcher = HttpFetcher::new(&config.fetch)?;
    let renderer = BrowserRenderer::new(config.browser.clone());
    let notifier: Box<dyn Notifier + Send + Sync> = match &config.notify.webhook_url {
        Some(url) => {
            log::info!("Change notifications will be POSTed to {}", url);
            Box::new(WebhookNotifier::new(url.clone())?)
        }
        None => Box::new(LogNotifier),
    };
    Ok(Scheduler::new(config, fetcher, renderer, notifier))
}

/// Main entry point.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("Config OK ({} site(s))", config.sites.len());
        }

        Command::Check => {
            config.validate()?;
            let config = Arc::new(config);
            let mut scheduler = build_scheduler(Arc::clone(&config))?;

            let summary = scheduler.round().await;
            scheduler.shutdown().await;
            log::info!(
                "Checked {} site(s): {} changed, {} unchanged, {} errors",
                summary.checked,
                summary.changed,
                summary.unchanged,
                summary.errors
            );
        }

        Command::Run => {
            config.validate()?;
            let config = Arc::new(config);

            if config.server.enabled {
                let server_config = config.server.clone();
                tokio::spawn(async move {
                    if let Err(e) = server::run_liveness(&server_config).await {
                        log::error!("Liveness endpoint failed: {}", e);
                    }
                });
            }

            let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("Interrupt received, stopping after the current round");
                    let _ = stop_tx.send(true);
                }
            });

            let mut scheduler = build_scheduler(Arc::clone(&config))?;
            scheduler.run(stop_rx).await;
        }
    }

    Ok(())
}
