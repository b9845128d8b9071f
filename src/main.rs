//! Harvester main entry point
//!
//! This is the command-line interface for the resumable collection harvester.

use clap::Parser;
use harvester::config::{load_config_with_hash, Config};
use harvester::crawler::{Flow, Harvester, RunEnd, RunMode};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Harvester: a resumable collection crawler
///
/// Follows cursor-paginated collections on a rate-limited API, flattens every
/// record into a fixed-column row and bulk-loads the rows into ClickHouse.
/// Progress is checkpointed so an interrupted run resumes where it stopped.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(version)]
#[command(about = "A resumable collection crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Flow to run
    #[arg(long, value_enum)]
    flow: Flow,

    /// API client id (overrides api.client-id)
    #[arg(long, env = "HARVESTER_CLIENT_ID", hide_env_values = true)]
    client_id: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume from the last checkpoint (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start from the beginning, ignoring the stored checkpoint
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be harvested without connecting
    #[arg(long, conflicts_with = "show_checkpoint")]
    dry_run: bool,

    /// Print the stored checkpoint of the flow and exit
    #[arg(long, conflicts_with = "dry_run")]
    show_checkpoint: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(client_id) = cli.client_id {
        config.api.client_id = client_id;
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, cli.flow);
        return Ok(());
    }

    let harvester = match Harvester::connect(config, cli.flow).await {
        Ok(harvester) => harvester,
        Err(e) => {
            tracing::error!("Failed to start {} flow: {}", cli.flow, e);
            return Err(e.into());
        }
    };

    let result = if cli.show_checkpoint {
        handle_show_checkpoint(&harvester).await
    } else {
        let mode = if cli.fresh {
            RunMode::Fresh
        } else {
            RunMode::Resume
        };
        handle_harvest(&harvester, mode).await
    };

    harvester.close().await;
    result
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("harvester=info,warn"),
            1 => EnvFilter::new("harvester=debug,info"),
            2 => EnvFilter::new("harvester=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be harvested
fn handle_dry_run(config: &Config, flow: Flow) {
    println!("=== Harvester Dry Run ({}) ===\n", flow);

    println!("API:");
    println!("  Base URL: {}", config.api.base_url);
    println!(
        "  Client id: {}",
        if config.api.client_id.is_empty() {
            "(missing)"
        } else {
            "(set)"
        }
    );
    println!("  Page size: {}", config.api.page_size);
    println!("  User agent: {}", config.api.user_agent);

    println!("\nCrawler:");
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Seed batch size: {}", config.crawler.batch_size);
    println!(
        "  Politeness jitter: {}ms",
        config.crawler.politeness_jitter_ms
    );
    if let Some(max_offset) = config.crawler.max_offset {
        println!("  Max seed offset: {}", max_offset);
    }

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!(
        "  Backoff: {}ms .. {}ms",
        config.retry.base_delay_ms, config.retry.max_delay_ms
    );

    println!("\nStore:");
    println!(
        "  ClickHouse: {} (database {})",
        config.clickhouse.url, config.clickhouse.database
    );
    println!("  Checkpoints: {:?}", config.checkpoint.backend);

    println!("\nFlow:");
    match flow {
        Flow::Followers => {
            let flow_config = &config.followers;
            println!("  Followers of user {}", flow_config.user_id);
            println!("  Target table: {}", flow_config.table);
            println!("  Checkpoint key: {}", flow_config.checkpoint_key);
        }
        Flow::Tracks | Flow::Snowball => {
            let flow_config = if flow == Flow::Tracks {
                &config.tracks
            } else {
                &config.snowball
            };
            println!("  Fetching /users/{{id}}/{} for every seed", flow.collection());
            println!("  Seed table: {}", flow_config.seed_table);
            if let Some(order_by) = &flow_config.seed_order_by {
                println!("  Seed order: {}", order_by);
            }
            println!("  Target table: {}", flow_config.table);
            println!("  Checkpoint key: {}", flow_config.checkpoint_key);
            println!("  Start offset: {}", flow_config.start_offset);
        }
    }

    println!("\n✓ Configuration is valid");
    if config.api.client_id.is_empty() {
        println!("✗ No client id: set api.client-id, --client-id or HARVESTER_CLIENT_ID");
    }
}

/// Handles the --show-checkpoint mode
async fn handle_show_checkpoint(harvester: &Harvester) -> Result<(), Box<dyn std::error::Error>> {
    let description = harvester.describe_checkpoint().await?;
    println!("{}", description);
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    harvester: &Harvester,
    mode: RunMode,
) -> Result<(), Box<dyn std::error::Error>> {
    match mode {
        RunMode::Fresh => tracing::info!("Starting fresh harvest (ignoring stored checkpoint)"),
        RunMode::Resume => tracing::info!("Starting harvest (resuming from checkpoint if any)"),
    }

    let cancel = harvester.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Shutdown requested, stopping after in-flight pages");
            cancel.cancel();
        }
    });

    match harvester.run(mode).await {
        Ok(summary) if summary.end == RunEnd::Failed => {
            tracing::error!("{} flow failed", summary.flow);
            Err(format!("{} flow failed; checkpoint kept for resumption", summary.flow).into())
        }
        Ok(_) => {
            tracing::info!("Harvest finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
