//! Notion-Harvest main entry point
//!
//! This is the command-line interface for exporting a Notion page tree to
//! static HTML files.

use clap::Parser;
use notion_harvest::config::{load_config, Config};
use notion_harvest::crawler::crawl;
use notion_harvest::decode::escape;
use notion_harvest::CrawlResult;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Notion-Harvest: export a Notion workspace subtree
///
/// Notion-Harvest crawls every page and database reachable from a root
/// object, downloads hosted attachments once each, and writes one HTML file
/// per page with links between pages rewritten to local files.
#[derive(Parser, Debug)]
#[command(name = "notion-harvest")]
#[command(version)]
#[command(about = "Export a Notion page tree to HTML", long_about = None)]
struct Cli {
    /// Root page or database id (bare, hyphenated, or a Notion URL)
    #[arg(long, value_name = "ID")]
    root: String,

    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Directory the HTML files are written to
    #[arg(long, value_name = "DIR", default_value = "notion-export")]
    out: PathBuf,

    /// Notion integration token (overrides the config file)
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Override the maximum number of concurrent fetches
    #[arg(long)]
    concurrency: Option<u32>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config(path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => Config::default(),
    };

    if let Some(token) = cli.token.clone() {
        config.api.token = Some(token);
    }
    if let Some(concurrency) = cli.concurrency {
        config.crawler.max_concurrent_fetches = concurrency;
    }
    notion_harvest::config::validate(&config)?;

    if cli.dry_run {
        handle_dry_run(&config, &cli);
        return Ok(());
    }

    handle_export(config, &cli.root, &cli.out).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("notion_harvest=info,warn"),
            1 => EnvFilter::new("notion_harvest=debug,info"),
            2 => EnvFilter::new("notion_harvest=trace,debug"),
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

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config, cli: &Cli) {
    println!("=== Notion-Harvest Dry Run ===\n");

    println!("Root: {}", cli.root);
    println!("Output directory: {}", cli.out.display());

    println!("\nCrawler Configuration:");
    println!(
        "  Max concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );

    println!("\nAPI:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  Notion version: {}", config.api.notion_version);
    println!("  Timeout: {}s", config.api.timeout_secs);
    println!(
        "  Retries: {} (base delay {}ms)",
        config.api.max_retries, config.api.retry_delay_ms
    );
    println!(
        "  Token: {}",
        if config.api.resolve_token().is_some() {
            "configured"
        } else {
            "missing"
        }
    );

    match notion_harvest::id::normalize_id(&cli.root) {
        Ok(id) => println!("\n✓ Would start crawling from {}", id),
        Err(e) => println!("\n✗ {}", e),
    }
}

/// Handles the main export operation
async fn handle_export(
    config: Config,
    root: &str,
    out: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut result = match crawl(config, root).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    tokio::fs::create_dir_all(out).await?;

    let links = result.resolve_all_links("./");
    let attachments = result
        .resolve_all_attachments("attachments", &out.join("attachments"))
        .await;
    tracing::info!(
        "Resolved {} links and {} attachments across {} pages",
        links,
        attachments,
        result.len()
    );

    write_pages(&result, out).await?;

    let failed: Vec<_> = result.pages_with_errors().collect();
    for page in &failed {
        for error in page.errors() {
            tracing::warn!("{} ({}): {}", page.title(), page.id(), error);
        }
    }

    println!(
        "✓ Exported {} pages and {} databases to {}",
        result.len(),
        result.databases().len(),
        out.display()
    );
    if !failed.is_empty() {
        println!("  {} pages reported errors (see log)", failed.len());
    }

    Ok(())
}

/// Writes `<out>/<id>.html` for every page
async fn write_pages(result: &CrawlResult, out: &Path) -> std::io::Result<()> {
    for page in result.pages() {
        let html = format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n{body}\n\
             </body>\n</html>\n",
            title = escape(page.title()),
            body = page.updated_markup()
        );
        tokio::fs::write(out.join(format!("{}.html", page.id())), html).await?;
    }
    Ok(())
}
