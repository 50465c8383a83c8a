/// The crawl result aggregator
use super::page::DecodedPage;
use crate::attachments::Materializer;
use crate::id::canonical_id;
use crate::registry::PlaceholderRegistry;
use crate::HarvestError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A crawled database; databases are traversed but are not pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSummary {
    pub id: String,
    pub title: String,

    /// Canonical ids of the rows, in query order
    pub row_ids: Vec<String>,
}

/// Every page reached by one crawl, keyed by canonical id
///
/// Membership is fixed once the crawl returns; only page markup changes
/// afterwards, through the resolve operations.
pub struct CrawlResult {
    root_id: String,
    pages: HashMap<String, DecodedPage>,
    databases: Vec<DatabaseSummary>,
    destination_root: PathBuf,
    registry: Arc<PlaceholderRegistry>,
    materializer: Arc<Materializer>,
}

impl CrawlResult {
    pub(crate) fn new(
        root_id: String,
        pages: HashMap<String, DecodedPage>,
        databases: Vec<DatabaseSummary>,
        destination_root: PathBuf,
        registry: Arc<PlaceholderRegistry>,
        materializer: Arc<Materializer>,
    ) -> Self {
        Self {
            root_id,
            pages,
            databases,
            destination_root,
            registry,
            materializer,
        }
    }

    /// Canonical id of the object the crawl started from
    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// All pages, in no particular order
    pub fn pages(&self) -> impl Iterator<Item = &DecodedPage> {
        self.pages.values()
    }

    /// Looks up a page by id in any accepted spelling
    ///
    /// # Returns
    ///
    /// * `Ok(&DecodedPage)` - The page
    /// * `Err(HarvestError::NotFound)` - The id was not part of this crawl
    pub fn page(&self, id: &str) -> Result<&DecodedPage, HarvestError> {
        self.pages
            .get(&canonical_id(id))
            .ok_or_else(|| HarvestError::NotFound(format!("page {}", id)))
    }

    /// Mutable variant of [`CrawlResult::page`]
    pub fn page_mut(&mut self, id: &str) -> Result<&mut DecodedPage, HarvestError> {
        self.pages
            .get_mut(&canonical_id(id))
            .ok_or_else(|| HarvestError::NotFound(format!("page {}", id)))
    }

    /// Pages that recorded at least one error
    pub fn pages_with_errors(&self) -> impl Iterator<Item = &DecodedPage> {
        self.pages.values().filter(|p| p.has_errors())
    }

    /// Databases traversed during the crawl
    pub fn databases(&self) -> &[DatabaseSummary] {
        &self.databases
    }

    /// Root under which attachments are downloaded
    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    /// Registry holding every placeholder issued during the crawl
    pub fn registry(&self) -> &PlaceholderRegistry {
        &self.registry
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Resolves every link placeholder on every page to `<path><id>.html`
    ///
    /// Links whose title was unknown at decode time take the title of the
    /// crawled target first.
    ///
    /// # Returns
    ///
    /// The total number of placeholders replaced
    pub fn resolve_all_links(&mut self, path: &str) -> usize {
        let titles: HashMap<String, String> = self
            .pages
            .values()
            .map(|p| (p.id().to_string(), p.title().to_string()))
            .collect();

        self.pages
            .values_mut()
            .map(|page| {
                page.backfill_link_titles(&titles);
                page.resolve_all_links(path)
            })
            .sum()
    }

    /// Materializes every attachment on every page into `directory`
    ///
    /// # Returns
    ///
    /// The total number of placeholders replaced
    pub async fn resolve_all_attachments(&mut self, link_prefix: &str, directory: &Path) -> usize {
        let mut replaced = 0;
        for page in self.pages.values_mut() {
            replaced += page
                .resolve_all_attachments(&self.materializer, link_prefix, directory)
                .await;
            for token in page.attachments() {
                if let Some(path) = &token.local_path {
                    self.registry.record_local_path(&token.placeholder, path);
                }
            }
        }

        tracing::info!(
            "Resolved {} attachment placeholders ({} downloads)",
            replaced,
            self.materializer.download_count()
        );
        replaced
    }
}

impl std::fmt::Debug for CrawlResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlResult")
            .field("root_id", &self.root_id)
            .field("pages", &self.pages.len())
            .field("databases", &self.databases.len())
            .field("destination_root", &self.destination_root)
            .finish()
    }
}
