//! Crawler module for Notion object fetching and traversal
//!
//! This module contains the core crawling logic, including:
//! - The Notion API transport with retry and pagination
//! - The content source seam the transport plugs into
//! - Bounded fetch scheduling with exactly-once claims
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod scheduler;
mod source;

pub use coordinator::{run_crawl, Coordinator};
pub use fetcher::{build_http_client, NotionClient};
pub use scheduler::{ScheduledFetch, Scheduler};
pub use source::ContentSource;

use crate::config::Config;
use crate::output::CrawlResult;
use crate::HarvestError;
use std::sync::Arc;

/// Runs a complete crawl against the Notion API
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Validate the configuration
/// 2. Build the authenticated API client
/// 3. Fetch and decode every object reachable from the root
/// 4. Return the aggregated result with placeholders unresolved
///
/// # Arguments
///
/// * `config` - The crawler configuration, including the token
/// * `root_id` - Root page or database id, bare, hyphenated, or as a URL
///
/// # Returns
///
/// * `Ok(CrawlResult)` - Crawl completed
/// * `Err(HarvestError)` - The configuration was rejected or the crawl aborted
pub async fn crawl(config: Config, root_id: &str) -> Result<CrawlResult, HarvestError> {
    crate::config::validate(&config)?;
    let client = NotionClient::from_config(&config.api)?;
    run_crawl(config, Arc::new(client), root_id).await
}
