//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Normalizing the root id and loading the user directory
//! - Dispatching fetches from the scheduler into a bounded task set
//! - Decoding fetched objects inside the worker that fetched them
//! - Feeding discovered references back into the frontier
//! - Separating crawl-fatal failures from per-object ones

use crate::attachments::Materializer;
use crate::config::Config;
use crate::crawler::scheduler::{ScheduledFetch, Scheduler};
use crate::crawler::source::ContentSource;
use crate::decode::{Decoded, Decoder, UserDirectory};
use crate::id::normalize_id;
use crate::output::{CrawlResult, DatabaseSummary, DecodedPage};
use crate::registry::PlaceholderRegistry;
use crate::state::{ObjectKind, ObjectRef};
use crate::{FetchError, HarvestError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// What one fetch task produced
enum Outcome {
    Page(Decoded),
    Database {
        summary: DatabaseSummary,
        rows: Vec<ObjectRef>,
    },
    Failed {
        target: ObjectRef,
        error: FetchError,
    },
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    source: Arc<dyn ContentSource>,
    scheduler: Scheduler,
    registry: Arc<PlaceholderRegistry>,
    destination_root: PathBuf,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawl configuration
    /// * `source` - Where objects are fetched from
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - The configuration is invalid
    pub fn new(config: Config, source: Arc<dyn ContentSource>) -> Result<Self, HarvestError> {
        crate::config::validate(&config)?;

        let destination_root = config
            .output
            .destination_root
            .clone()
            .unwrap_or_else(default_destination_root);
        let scheduler = Scheduler::new(&config.crawler);

        Ok(Self {
            config: Arc::new(config),
            source,
            scheduler,
            registry: Arc::new(PlaceholderRegistry::new()),
            destination_root,
        })
    }

    /// Runs the crawl from `root_id` until the frontier drains
    ///
    /// The root's kind is unknown, so it is fetched as a page first and as a
    /// database if no such page exists. Any failure on the root, and an
    /// unauthorized response anywhere, aborts the crawl: in-flight fetches
    /// are cancelled and no partial result is returned.
    pub async fn run(mut self, root_id: &str) -> Result<CrawlResult, HarvestError> {
        let root = normalize_id(root_id)?;
        let start_time = Instant::now();
        tracing::info!(
            "Starting crawl from {} (max {} concurrent fetches)",
            root,
            self.config.crawler.max_concurrent_fetches
        );

        let users = match self.source.list_users().await {
            Ok(users) => UserDirectory::from_pairs(users),
            Err(e) => {
                tracing::warn!("Could not list users, names will show as ids: {}", e);
                UserDirectory::new()
            }
        };
        let decoder = Decoder::new(Arc::clone(&self.registry), Arc::new(users));

        self.scheduler.enqueue(ObjectRef::unresolved(root.clone()));

        let mut pages: HashMap<String, DecodedPage> = HashMap::new();
        let mut databases = Vec::new();
        let mut tasks: JoinSet<Outcome> = JoinSet::new();
        let mut completed = 0usize;

        loop {
            while let Some(scheduled) = self.scheduler.next_fetch() {
                let source = Arc::clone(&self.source);
                let decoder = decoder.clone();
                tasks.spawn(fetch_and_decode(source, decoder, scheduled));
            }

            let joined = match tasks.join_next().await {
                Some(joined) => joined,
                None => {
                    tracing::debug!("Frontier is empty, crawl complete");
                    break;
                }
            };

            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tasks.abort_all();
                    return Err(HarvestError::Worker(e.to_string()));
                }
            };

            match outcome {
                Outcome::Page(Decoded { page, references }) => {
                    for target in references {
                        self.scheduler.enqueue(target);
                    }
                    if page.has_errors() {
                        tracing::debug!(
                            "Page {} decoded with {} errors",
                            page.id(),
                            page.errors().len()
                        );
                    }
                    pages.insert(page.id().to_string(), page);
                }
                Outcome::Database { summary, rows } => {
                    tracing::debug!("Database {} has {} rows", summary.id, rows.len());
                    for target in rows {
                        self.scheduler.enqueue(target);
                    }
                    databases.push(summary);
                }
                Outcome::Failed { target, error } => {
                    if let FetchError::Unauthorized(message) = &error {
                        tasks.abort_all();
                        return Err(HarvestError::Unauthorized {
                            id: target.id,
                            message: message.clone(),
                        });
                    }
                    if target.id == root {
                        tasks.abort_all();
                        return Err(HarvestError::RootUnavailable {
                            id: target.id,
                            source: error,
                        });
                    }

                    tracing::warn!("Failed to fetch {}: {}", target, error);
                    pages.insert(target.id.clone(), DecodedPage::failed(target.id, error));
                }
            }

            completed += 1;
            if completed % 10 == 0 {
                let rate = completed as f64 / start_time.elapsed().as_secs_f64();
                tracing::info!(
                    "Progress: {} objects fetched, {} in frontier, {} in flight, {:.2} objects/sec",
                    completed,
                    self.scheduler.frontier_size(),
                    self.scheduler.in_flight(),
                    rate
                );
            }
        }

        tracing::info!(
            "Crawl completed: {} pages and {} databases in {:?} ({} placeholders issued)",
            pages.len(),
            databases.len(),
            start_time.elapsed(),
            self.registry.len()
        );

        let materializer = Arc::new(Materializer::new(
            Arc::clone(&self.source),
            &self.destination_root,
        ));
        Ok(CrawlResult::new(
            root,
            pages,
            databases,
            self.destination_root,
            self.registry,
            materializer,
        ))
    }
}

/// Fetches one object and decodes it while still holding the fetch permit
async fn fetch_and_decode(
    source: Arc<dyn ContentSource>,
    decoder: Decoder,
    scheduled: ScheduledFetch,
) -> Outcome {
    let target = scheduled.target.clone();
    tracing::debug!("Fetching {}", target);

    let fetched = match target.kind {
        Some(ObjectKind::Page) => source.fetch_page(&target.id).await,
        Some(ObjectKind::Database) => source.fetch_database(&target.id).await,
        None => match source.fetch_page(&target.id).await {
            Err(e) if e.is_missing() => {
                tracing::debug!("{} is not a page ({}), trying as database", target.id, e);
                source.fetch_database(&target.id).await
            }
            other => other,
        },
    };

    let outcome = match fetched {
        Ok(raw) => match raw.kind {
            ObjectKind::Page => Outcome::Page(decoder.decode(&raw)),
            ObjectKind::Database => {
                let (summary, rows) = decoder.decode_database(&raw);
                Outcome::Database { summary, rows }
            }
        },
        Err(error) => Outcome::Failed { target, error },
    };

    drop(scheduled);
    outcome
}

/// `<tmp>/notion-harvest/<date>--<run-id>`
fn default_destination_root() -> PathBuf {
    let run_id = uuid::Uuid::new_v4().simple().to_string();
    std::env::temp_dir().join("notion-harvest").join(format!(
        "{}--{}",
        chrono::Local::now().format("%Y-%m-%d"),
        &run_id[..10]
    ))
}

/// Runs a complete crawl against a given source
///
/// # Arguments
///
/// * `config` - The crawl configuration
/// * `source` - Where objects are fetched from
/// * `root_id` - Root page or database id, bare, hyphenated, or as a URL
pub async fn run_crawl(
    config: Config,
    source: Arc<dyn ContentSource>,
    root_id: &str,
) -> Result<CrawlResult, HarvestError> {
    Coordinator::new(config, source)?.run(root_id).await
}
