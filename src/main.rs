//! kinobox-crawler main entry point
//!
//! This is the command-line interface for the kinobox movie and comment crawler.

use anyhow::Context;
use clap::{Parser, Subcommand};
use kinobox_crawler::config::{load_or_default, Config};
use kinobox_crawler::control::{send_stop, ControlServer};
use kinobox_crawler::crawler::{items_path, job_dir, Coordinator, CrawlOptions, Spider};
use kinobox_crawler::output::{generate_summary, print_summary, JsonLinesSink};
use kinobox_crawler::storage::{state_db_path, SqliteStorage};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// kinobox-crawler: movie metadata and user comments from kinobox.cz
///
/// Every movie is emitted once, as a single JSON line holding its metadata and
/// the comments of all its comment pages.
#[derive(Parser, Debug)]
#[command(name = "kinobox-crawler")]
#[command(version = "1.0.0")]
#[command(about = "Crawls kinobox.cz movies and their comments", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a spider, resuming its previous run if it was interrupted
    Start {
        /// Spider to run: kinobox or kinobox-sitemap
        spider: Spider,

        /// Reset the spider's job directory and start from scratch
        #[arg(short = 'r', long = "reset")]
        reset: bool,
    },

    /// Ask a running crawl to stop through its control channel
    Stop,

    /// Show statistics of a spider's latest run
    Stats {
        spider: Spider,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    match &cli.config {
        Some(path) => tracing::info!(
            "Configuration loaded from {} (hash: {})",
            path.display(),
            config_hash
        ),
        None => tracing::info!("Using built-in configuration"),
    }

    match cli.command {
        Commands::Start { spider, reset } => {
            let options = CrawlOptions {
                spider,
                fresh: reset,
                config_hash,
            };
            handle_crawl(config, options).await
        }
        Commands::Stop => handle_stop(&config).await,
        Commands::Stats { spider } => handle_stats(&config, spider),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("kinobox_crawler=info,chromiumoxide=warn,warn"),
            1 => EnvFilter::new("kinobox_crawler=debug,chromiumoxide=warn,info"),
            2 => EnvFilter::new("kinobox_crawler=trace,debug"),
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

/// Handles `start`: runs a spider until it finishes or is stopped
async fn handle_crawl(config: Config, options: CrawlOptions) -> anyhow::Result<()> {
    let spider = options.spider;
    if options.fresh {
        tracing::info!("Starting {} from scratch", spider);
    } else {
        tracing::info!("Starting {} (will resume if interrupted run exists)", spider);
    }

    let items = items_path(&config.output, spider);
    let sink = JsonLinesSink::create(&items)
        .with_context(|| format!("Failed to open item feed {}", items.display()))?;
    tracing::info!("Writing items to {}", items.display());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, stopping crawl");
                cancel.cancel();
            }
        });
    }

    let control = config.control.clone();
    let mut coordinator = Coordinator::new(config, options, Arc::new(sink), cancel.clone()).await?;

    let control_task = if control.enabled {
        match ControlServer::bind(&control, cancel.clone(), coordinator.progress()).await {
            Ok(server) => Some(tokio::spawn(server.run())),
            Err(e) => {
                tracing::warn!("Control channel disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let result = coordinator.run().await;

    if let Some(task) = control_task {
        task.abort();
    }

    match result {
        Ok(()) if cancel.is_cancelled() => {
            tracing::info!("Crawl stopped; run `start {}` again to resume", spider);
            Ok(())
        }
        Ok(()) => {
            tracing::info!("Crawl completed successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles `stop`: sends the stop command to a running crawl
async fn handle_stop(config: &Config) -> anyhow::Result<()> {
    let reply = send_stop(&config.control)
        .await
        .context("Failed to reach the running crawl")?;
    println!("{}", reply);
    Ok(())
}

/// Handles `stats`: shows the latest run of a spider
fn handle_stats(config: &Config, spider: Spider) -> anyhow::Result<()> {
    let db_path = state_db_path(&job_dir(&config.output, spider));
    if !db_path.exists() {
        println!("No crawl state for {} at {}", spider, db_path.display());
        return Ok(());
    }

    println!("Database: {}\n", db_path.display());

    let storage = SqliteStorage::new(&db_path)?;
    let summary = generate_summary(&storage)?;
    print_summary(&summary);

    Ok(())
}
