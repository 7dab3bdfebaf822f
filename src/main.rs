//! WSF Scraper main entry point
//!
//! This is the command-line interface for the WSF document scraper.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wsf_scraper::config::{load_config_with_hash, Config};
use wsf_scraper::exchange::{export_json, import_json};
use wsf_scraper::server::{self, AppState};
use wsf_scraper::{ContentStore, JobManager, ScraperError};

/// WSF Scraper: harvests policy documents into a deduplicated catalog
///
/// Spiders crawl their seed listings, download every linked document once per
/// unique content, and record it in the catalog. The `serve` command exposes
/// a control API to run and stop spiders remotely.
#[derive(Parser, Debug)]
#[command(name = "wsf-scraper")]
#[command(version = "1.0.0")]
#[command(about = "A deduplicating document scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "scraper.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP control API
    Serve {
        /// Override the bind address from the config
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run one spider to completion (Ctrl+C stops it)
    Crawl {
        /// Spider name
        spider: String,
    },
    /// List configured spiders
    Spiders,
    /// Write the catalog as JSON to a file, or stdout
    Export {
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
    /// Import a JSON export into the catalog
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Clear the catalog
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let store = ContentStore::open(&config.storage).context("failed to open the catalog")?;

    match cli.command {
        Command::Serve { bind } => handle_serve(&config, store, bind).await,
        Command::Crawl { spider } => handle_crawl(&config, store, &spider).await,
        Command::Spiders => handle_spiders(&config, store),
        Command::Export { path } => handle_export(store, path).await,
        Command::Import { file } => handle_import(store, file).await,
        Command::Reset => handle_reset(store),
    }?;

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("wsf_scraper=info,warn"),
            1 => EnvFilter::new("wsf_scraper=debug,info"),
            2 => EnvFilter::new("wsf_scraper=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn handle_serve(
    config: &Config,
    store: ContentStore,
    bind: Option<String>,
) -> wsf_scraper::Result<()> {
    let manager = JobManager::new(config, store)?;
    let state = Arc::new(AppState::new(manager));
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());

    server::serve(&bind, state).await?;
    Ok(())
}

/// Runs a single spider and prints its final statistics
async fn handle_crawl(
    config: &Config,
    store: ContentStore,
    spider: &str,
) -> wsf_scraper::Result<()> {
    let manager = Arc::new(JobManager::new(config, store)?);
    let started = manager.start(spider)?;
    tracing::info!("Started job {} for spider {}", started.job_id, spider);

    let stopper = Arc::clone(&manager);
    let name = spider.to_string();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping {}", name);
            stopper.stop(&name);
        }
    });

    let Some(snapshot) = manager.wait(spider).await else {
        return Ok(());
    };

    println!("=== Crawl {} ===", snapshot.state);
    println!("  Spider:   {}", snapshot.spider);
    println!("  Job:      {}", snapshot.job_id);
    println!("  Requests: {}", snapshot.counters.requested);
    println!("  Scraped:  {}", snapshot.counters.scraped);
    println!("  Dropped:  {}", snapshot.counters.dropped);
    println!("  Errors:   {}", snapshot.counters.errors);
    println!(
        "  Time:     {:.1}s",
        snapshot.total_time().num_milliseconds() as f64 / 1000.0
    );
    Ok(())
}

fn handle_spiders(config: &Config, store: ContentStore) -> wsf_scraper::Result<()> {
    let manager = JobManager::new(config, store)?;
    for name in manager.spiders() {
        println!("{}", name);
    }
    Ok(())
}

async fn handle_export(store: ContentStore, path: Option<PathBuf>) -> wsf_scraper::Result<()> {
    let written = tokio::task::spawn_blocking(move || -> Result<usize, ScraperError> {
        match &path {
            Some(path) => {
                let file = std::fs::File::create(path)?;
                Ok(export_json(&store, std::io::BufWriter::new(file))?)
            }
            None => {
                let stdout = std::io::stdout();
                let mut lock = stdout.lock();
                let written = export_json(&store, &mut lock)?;
                lock.write_all(b"\n")?;
                Ok(written)
            }
        }
    })
    .await??;

    tracing::info!("Exported {} records", written);
    Ok(())
}

async fn handle_import(store: ContentStore, file: PathBuf) -> wsf_scraper::Result<()> {
    tracing::info!("Importing {}", file.display());
    let payload = tokio::fs::read(&file).await?;

    let report = tokio::task::spawn_blocking(move || import_json(&store, &payload)).await??;

    println!(
        "✓ Imported {} records ({} duplicates, {} rejected)",
        report.inserted,
        report.duplicates,
        report.errors.len()
    );
    for error in &report.errors {
        println!("  - record {}: {}", error.index, error.reason);
    }
    Ok(())
}

fn handle_reset(store: ContentStore) -> wsf_scraper::Result<()> {
    store.reset()?;
    println!("✓ Catalog cleared");
    Ok(())
}
