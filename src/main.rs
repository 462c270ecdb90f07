//! Trawl main entry point
//!
//! This is the command-line interface for the trawl crawler.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use trawl::config::{load_config, Config};
use trawl::crawler::rules::{follow_links, html_only};
use trawl::output::{print_summary, record_rule, RecordSink, SqliteSink, StdoutSink};
use trawl::{CrawlOption, Crawler};

/// Trawl: a rule-driven concurrent web crawler
///
/// Trawl starts from a list of seed URLs, follows every link it finds on
/// HTML pages, paces requests per origin, and records what it fetched.
#[derive(Parser, Debug)]
#[command(name = "trawl")]
#[command(version)]
#[command(about = "A rule-driven concurrent web crawler", long_about = None)]
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

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Override the number of concurrent fetches
    #[arg(long, value_name = "N")]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    if let Some(workers) = cli.workers {
        config.crawler.workers = Some(workers);
    }

    if cli.dry_run {
        handle_dry_run(&config)
    } else {
        handle_crawl(config).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("trawl=info,warn"),
            1 => EnvFilter::new("trawl=debug,info"),
            2 => EnvFilter::new("trawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs go to stderr so page lines on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    // Reads list files and builds the client, so those errors surface too
    let options = config.to_options()?;
    let seeds = options
        .iter()
        .find_map(|option| match option {
            CrawlOption::StartUrls(urls) => Some(urls.clone()),
            _ => None,
        })
        .unwrap_or_default();

    println!("=== Trawl Dry Run ===\n");

    println!("Crawler Configuration:");
    match config.crawler.workers {
        Some(workers) => println!("  Workers: {}", workers),
        None => println!("  Workers: one per CPU"),
    }
    println!("  Delay per origin: {}ms", config.crawler.delay_ms);
    println!("  Queue capacity: {}", config.crawler.queue_capacity);
    println!("  Overflow limit: {}", config.crawler.overflow_limit);
    println!("  Pacing capacity: {}", config.crawler.pacing_capacity);
    println!("  User agent: {}", config.crawler.user_agent);
    println!("  Timeout: {}s", config.crawler.timeout_secs);

    println!("\nFilters:");
    println!("  Allow patterns: {}", config.filters.allow.len());
    println!("  Exclude patterns: {}", config.filters.exclude.len());
    if let Some(file) = &config.filters.exclude_file {
        println!("  Exclude file: {}", file);
    }

    println!("\nHeaders ({}):", config.headers.len());
    for (name, value) in &config.headers {
        println!("  {}: {}", name, value);
    }

    println!("\nOutput:");
    match &config.output.database_path {
        Some(path) => println!("  Database: {}", path),
        None => println!("  Database: none"),
    }
    println!("  Print pages: {}", config.output.print);

    println!("\nSeeds ({}):", seeds.len());
    for seed in &seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling with {} seed URLs", seeds.len());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    let mut options = config.to_options()?;

    // Record every page, then follow links of HTML pages only
    let mut sinks: Vec<Arc<dyn RecordSink>> = Vec::new();
    if let Some(path) = &config.output.database_path {
        let sink = SqliteSink::new(Path::new(path))
            .with_context(|| format!("Failed to open database {}", path))?;
        tracing::info!("Recording pages to {}", path);
        sinks.push(Arc::new(sink));
    }
    if config.output.print {
        sinks.push(Arc::new(StdoutSink::stdout()));
    }
    for sink in &sinks {
        options.push(CrawlOption::Response(record_rule(Arc::clone(sink))));
    }
    options.push(CrawlOption::Response(html_only()));
    options.push(CrawlOption::Response(follow_links()));

    let crawler = Crawler::builder().options(options)?.start()?;

    let interrupted = crawler.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, aborting crawl");
            interrupted.abort();
        }
    });

    let summary = crawler.wait().await;

    for sink in &sinks {
        if let Err(e) = sink.flush() {
            tracing::error!("Failed to flush output: {}", e);
        }
    }

    print_summary(&summary);
    Ok(())
}
