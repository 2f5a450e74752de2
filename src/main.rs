//! ord-syncer main entry point
//!
//! This is the command-line interface for the ordered inscription syncer.

use anyhow::Context;
use clap::Parser;
use ord_syncer::config::{load_config_with_hash, Config};
use ord_syncer::storage::{CheckpointStore, SqliteStorage};
use ord_syncer::{run_sync, sync_once, ParserRegistry};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// ord-syncer: an ordered inscription syncer
///
/// Walks the inscription listing of an ord explorer, classifies every
/// inscription's content and commits the results in ascending inscription
/// number, resuming from the stored checkpoint.
#[derive(Parser, Debug)]
#[command(name = "ord-syncer")]
#[command(version)]
#[command(about = "An ordered inscription syncer", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be synced without syncing
    #[arg(long, conflicts_with_all = ["status", "once"])]
    dry_run: bool,

    /// Show the checkpoint and table counts from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "once"])]
    status: bool,

    /// Walk the listing once and exit instead of polling
    #[arg(long, conflicts_with_all = ["dry_run", "status"])]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    if cli.status {
        return handle_status(&config);
    }

    let cancel = CancellationToken::new();
    tokio::spawn(listen_for_shutdown(cancel.clone()));

    if cli.once {
        let summary = sync_once(&config, cancel).await.context("sync failed")?;
        println!(
            "Walked {} pages ({} refs): {} committed, {} skipped, checkpoint {}",
            summary.pages,
            summary.refs,
            summary.committed,
            summary.skipped,
            format_checkpoint(summary.checkpoint)
        );
        return Ok(());
    }

    run_sync(&config, cancel).await.context("sync failed")?;
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ord_syncer=info,warn"),
            1 => EnvFilter::new("ord_syncer=debug,info"),
            2 => EnvFilter::new("ord_syncer=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Cancels `cancel` on SIGINT or SIGTERM
async fn listen_for_shutdown(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT"),
                    _ = terminate.recv() => tracing::info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Cannot listen for SIGINT: {}", e);
                    return;
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for Ctrl-C: {}", e);
            return;
        }
        tracing::info!("Received Ctrl-C");
    }

    tracing::info!("Shutting down, waiting for workers");
    cancel.cancel();
}

/// Handles the --dry-run mode: validates config and shows what would be synced
fn handle_dry_run(config: &Config) {
    println!("=== ord-syncer Dry Run ===\n");

    println!("Syncer Configuration:");
    println!("  Concurrency: {}", config.syncer.concurrency);
    println!("  Start position: {}", config.syncer.inscription_id_start);
    println!("  Poll interval: {}s", config.syncer.poll_interval);
    println!("  Checkpoint key: {}", config.syncer.checkpoint_key);

    println!("\nSource:");
    println!("  Base URL: {}", config.source.base_url);
    println!("  Request timeout: {}s", config.source.request_timeout);
    println!("  Connect timeout: {}s", config.source.connect_timeout);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let registry = ParserRegistry::with_defaults();
    println!("\nContent parsers: {}", registry.parser_names().join(", "));

    println!("\n✓ Configuration is valid");
}

/// Handles the --status mode: shows the checkpoint and table counts
fn handle_status(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("failed to open database")?;

    let checkpoint = storage.get(&config.syncer.checkpoint_key)?;
    println!(
        "Checkpoint ({}): {}",
        config.syncer.checkpoint_key,
        format_checkpoint(checkpoint)
    );
    println!("Inscriptions: {}", storage.count_inscriptions()?);
    println!("Registered names: {}", storage.count_domains()?);

    Ok(())
}

fn format_checkpoint(checkpoint: Option<i64>) -> String {
    checkpoint.map_or_else(|| "none".to_string(), |value| value.to_string())
}
