use anyhow::{Context, Result};
use clap::Parser;
use miniflux_rules::config::{self, Config};
use miniflux_rules::scheduler;
use miniflux_rules::{EntrySource, Matcher, MinifluxClient, Processor};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "miniflux-rules",
    about = "Mark Miniflux entries read or remove them based on regex rules"
)]
struct Args {
    /// Path to the rules configuration file
    #[arg(
        long,
        value_name = "FILE",
        env = "MINIFLUX_RULES_FILE",
        default_value = "rules.toml"
    )]
    config: PathBuf,

    /// Log what would change without applying anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.dry_run {
        tracing::info!("Dry-run mode enabled: no changes will be applied");
    }

    let config = Config::load(&args.config).with_context(|| {
        format!(
            "Failed to load config from '{}'",
            args.config.display()
        )
    })?;

    let api_key = config::api_key_from_env().context("Failed to get API key")?;
    tracing::debug!("API key loaded");

    let matcher = Arc::new(Matcher::new(&config.rules).context("Failed to compile rules")?);
    tracing::info!(rules = matcher.len(), "Compiled rules");

    let client = MinifluxClient::new(&config.miniflux_url, api_key)
        .context("Failed to create Miniflux client")?;

    // Connectivity check only; a transient failure here should not stop loop mode
    match client.feeds().await {
        Ok(feeds) => tracing::info!(
            url = %client.base_url(),
            feeds = feeds.len(),
            "Connected to Miniflux"
        ),
        Err(e) => tracing::warn!(
            url = %client.base_url(),
            error = %e,
            "Could not list feeds"
        ),
    }

    let processor = Processor::new(client, matcher, args.dry_run);

    match config.interval() {
        None => {
            tracing::info!("Running in single-run mode");
            scheduler::run_once(&processor)
                .await
                .context("Processing run failed")?;
        }
        Some(interval) => {
            tracing::info!(
                interval_secs = interval.as_secs(),
                "Running in loop mode"
            );
            scheduler::run_every(&processor, interval, scheduler::shutdown_signal()).await;
        }
    }

    Ok(())
}
