//! Carcinologer main entry point
//!
//! This is the command-line interface for the Carcinologer Moltbook harvester.

use anyhow::Context;
use carcinologer::config::{
    default_config_hash, load_config_with_hash, resolve_credentials, Config, API_KEY_ENV,
};
use carcinologer::crawler::{harvest, ApiClient, CancelToken};
use carcinologer::output::print_report;
use carcinologer::HarvestError;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Carcinologer: a Moltbook API harvester
///
/// Carcinologer pages through the Moltbook communities, leaderboard, feeds and
/// (optionally) comments, and merges what it finds into one SQLite dataset
/// file per resource kind.
#[derive(Parser, Debug)]
#[command(name = "carcinologer")]
#[command(version)]
#[command(about = "A Moltbook API harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Also fetch comments for every post that has any
    #[arg(long)]
    with_comments: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without sending requests
    #[arg(long, conflicts_with = "search")]
    dry_run: bool,

    /// Run one search query, print the hits and exit
    #[arg(long, value_name = "QUERY")]
    search: Option<String>,

    /// Maximum number of search hits
    #[arg(long, default_value_t = 20, requires = "search")]
    limit: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    let (config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, hash)
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            (Config::default(), default_config_hash())
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)
    } else if let Some(query) = &cli.search {
        handle_search(&config, query, cli.limit, cli.quiet).await
    } else {
        handle_harvest(config, config_hash, cli.with_comments, cli.quiet).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("carcinologer=info,warn"),
            1 => EnvFilter::new("carcinologer=debug,info"),
            2 => EnvFilter::new("carcinologer=trace,debug"),
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
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Carcinologer Dry Run ===\n");

    println!("API:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  Timeout: {}s (connect {}s)", config.api.timeout_secs, config.api.connect_timeout_secs);
    println!("  Credentials required: {}", config.api.require_credentials);

    let api_key = resolve_credentials(&config.api).context("Failed to read credentials")?;
    let source = if std::env::var(API_KEY_ENV).map_or(false, |v| !v.trim().is_empty()) {
        API_KEY_ENV.to_string()
    } else {
        "credentials file".to_string()
    };
    match &api_key {
        Some(_) => println!("  API key: present (from {})", source),
        None => println!("  API key: none (anonymous mode)"),
    }

    println!("\nFetching:");
    println!("  Page size: {}", config.fetch.page_size);
    println!("  Feed sort: {}", config.fetch.sort);
    println!("  Comment sort: {}", config.fetch.comment_sort);
    println!(
        "  Minimum request interval: {}ms",
        config.fetch.min_request_interval_ms
    );
    println!(
        "  Retries: {} attempts, backoff {}ms..{}ms",
        config.fetch.max_attempts, config.fetch.backoff_base_ms, config.fetch.max_backoff_ms
    );
    match config.fetch.max_posts {
        Some(max) => println!("  Max posts per feed: {}", max),
        None => println!("  Max posts per feed: unlimited"),
    }

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Data directory: {}", config.output.data_dir.display());
    println!("  Summary: {}", config.output.summary_path.display());

    println!("\n✓ Configuration is valid");
    if api_key.is_none() && config.api.require_credentials {
        anyhow::bail!(HarvestError::MissingCredentials);
    }

    Ok(())
}

/// Handles the --search mode: prints matching posts and comments
async fn handle_search(config: &Config, query: &str, limit: u32, quiet: bool) -> anyhow::Result<()> {
    let api_key = resolve_credentials(&config.api).context("Failed to read credentials")?;
    if api_key.is_none() && config.api.require_credentials {
        return Err(HarvestError::MissingCredentials.into());
    }

    let client = ApiClient::new(config, api_key).context("Failed to build the API client")?;
    let results = client.search(query, limit).await;
    client.close();
    let results = results.with_context(|| format!("Search for '{}' failed", query))?;

    if !quiet {
        println!("=== Search: {} ({} hits) ===\n", query, results.len());
        for result in &results {
            let title = result
                .title
                .as_deref()
                .or(result.content.as_deref())
                .unwrap_or("");
            let snippet: String = title.chars().take(80).collect();
            println!(
                "  [{}] {} {}",
                result.kind.as_deref().unwrap_or("?"),
                result.id,
                snippet
            );
        }
    }

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    config_hash: String,
    with_comments: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    tracing::info!(
        "Harvesting into {} (comments: {})",
        config.output.data_dir.display(),
        if with_comments { "yes" } else { "no" }
    );

    let cancel = CancelToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; stopping after the current request");
            signal_token.cancel();
        }
    });

    let report = harvest(config, config_hash, with_comments, cancel)
        .await
        .context("Harvest could not start")?;

    if !quiet {
        print_report(&report);
    }

    if report.is_complete() {
        tracing::info!("Harvest completed successfully");
    } else {
        tracing::warn!("Harvest completed with degraded or failed resources");
    }

    Ok(())
}
