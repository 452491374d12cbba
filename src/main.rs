//! Cratedigger main entry point
//!
//! Command-line interface for the collection crawler.

use async_trait::async_trait;
use clap::Parser;
use cratedigger::auth::ChallengeSolver;
use cratedigger::config::load_config_with_hash;
use cratedigger::extract::{Challenge, SiteExtractor};
use cratedigger::output::{collect_stats, log_stats, write_results};
use cratedigger::{CrawlError, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Cratedigger: an authenticated social-graph collection crawler
///
/// Logs in to the target site, then walks the contact graph out from the
/// seed entity up to the configured depth, collecting each visited user's
/// public collection into a JSON result file.
#[derive(Parser, Debug)]
#[command(name = "cratedigger")]
#[command(version)]
#[command(about = "Crawl a social graph and scrape user collections", long_about = None)]
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

    /// Validate config and show the crawl plan without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)?;
    tracing::info!("Configuration loaded (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("cratedigger=info,warn"),
            1 => EnvFilter::new("cratedigger=debug,info"),
            2 => EnvFilter::new("cratedigger=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Prompts a human on stdin for the captcha solution
///
/// `spawn_blocking` keeps the console read off the async runtime, so only
/// the one worker that hit the challenge suspends while the rest of the
/// pool keeps crawling.
struct StdinSolver;

#[async_trait]
impl ChallengeSolver for StdinSolver {
    async fn solve(&self, challenge: &Challenge) -> Result<String> {
        let image_url = challenge.image_url.clone();

        tokio::task::spawn_blocking(move || {
            println!("captcha image: {}", image_url);
            print!("solution: ");
            std::io::stdout().flush()?;

            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            Ok::<String, std::io::Error>(line.trim().to_string())
        })
        .await
        .map_err(|e| CrawlError::Challenge(format!("challenge prompt task failed: {}", e)))?
        .map_err(CrawlError::Io)
    }
}

/// Handles --dry-run: validates config and shows what would be crawled
fn handle_dry_run(config: &cratedigger::Config) {
    println!("=== Cratedigger Dry Run ===\n");

    println!("Crawler:");
    println!("  Seed entity: {}", config.crawler.seed_id);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Workers / sessions: {}", config.crawler.max_workers);
    println!("  Page size: {}", config.crawler.page_size);
    println!(
        "  Rate limit jitter: {}-{}ms",
        config.crawler.rate_limit_min_ms, config.crawler.rate_limit_max_ms
    );

    println!("\nSite:");
    println!("  Login URL: {}", config.site.login_url);
    println!("  Contacts template: {}", config.site.contacts_url_template);
    println!(
        "  Collection template: {}",
        config.site.collection_url_template
    );

    println!("\nOutput:");
    println!("  Results file: {}", config.output.results_path);

    println!("\nLogin account: {}", config.credentials.email);
    println!("\n✓ Configuration is valid");
}

/// Runs the crawl and writes the result file
async fn handle_crawl(config: cratedigger::Config) -> anyhow::Result<()> {
    let results_path = PathBuf::from(&config.output.results_path);

    let extractor = Arc::new(SiteExtractor::new());
    let solver = Arc::new(StdinSolver);

    let entities = cratedigger::crawler::crawl(config, extractor, solver).await?;

    write_results(&results_path, &entities)?;
    log_stats(&collect_stats(&entities));

    Ok(())
}
