//! Attachment materializer
//!
//! Downloads each distinct hosted file once per crawl, however many tokens
//! point at it, and places it in a directory named after its source so two
//! files called `image.png` from different sources never collide.
//!
//! Layout:
//!
//! ```text
//! <destination_root>/attachments/<digest>/<filename>   download cache
//! <directory_path>/<digest>/<filename>                 placed copy
//! ```

use crate::crawler::ContentSource;
use crate::registry::AttachmentToken;
use crate::FetchError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::OnceCell;

/// Why a single attachment could not be materialized
#[derive(Debug, Clone, Error)]
pub enum AttachmentError {
    #[error("download failed: {0}")]
    Download(FetchError),

    #[error("could not write file: {0}")]
    Io(String),
}

impl From<std::io::Error> for AttachmentError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

type CacheEntry = Arc<OnceCell<PathBuf>>;

/// Crawl-wide download cache keyed by source
pub struct Materializer {
    source: Arc<dyn ContentSource>,
    cache_root: PathBuf,
    entries: Mutex<HashMap<String, CacheEntry>>,
    downloads: AtomicUsize,
}

impl Materializer {
    /// Creates a materializer caching under `<destination_root>/attachments`
    pub fn new(source: Arc<dyn ContentSource>, destination_root: &Path) -> Self {
        Self {
            source,
            cache_root: destination_root.join("attachments"),
            entries: Mutex::new(HashMap::new()),
            downloads: AtomicUsize::new(0),
        }
    }

    /// Downloads (once) and places the token's file under `directory`
    ///
    /// # Arguments
    ///
    /// * `token` - The attachment to materialize
    /// * `directory` - Root under which `<digest>/<filename>` is created
    ///
    /// # Returns
    ///
    /// * `Ok(PathBuf)` - Path of the placed file
    /// * `Err(AttachmentError)` - Download or write failure; nothing was placed
    pub async fn materialize(
        &self,
        token: &AttachmentToken,
        directory: &Path,
    ) -> Result<PathBuf, AttachmentError> {
        let cached = self.cached_copy(token).await?;

        let placed = directory.join(token.directory_name()).join(token.filename());
        if placed != cached && !tokio::fs::try_exists(&placed).await? {
            if let Some(parent) = placed.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(&cached, &placed).await?;
        }
        Ok(placed)
    }

    /// Number of downloads actually performed
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Root of the download cache
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    async fn cached_copy(&self, token: &AttachmentToken) -> Result<PathBuf, AttachmentError> {
        let entry = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(token.source_key.clone()).or_default())
        };

        // A failed download leaves the cell empty so a later call retries
        entry
            .get_or_try_init(|| self.download(token))
            .await
            .cloned()
    }

    async fn download(&self, token: &AttachmentToken) -> Result<PathBuf, AttachmentError> {
        tracing::debug!("Downloading attachment {}", token.source_key);
        let bytes = self
            .source
            .download(&token.source_url)
            .await
            .map_err(AttachmentError::Download)?;
        self.downloads.fetch_add(1, Ordering::SeqCst);

        let path = self
            .cache_root
            .join(token.directory_name())
            .join(token.filename());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;

        tracing::info!("Stored attachment {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

impl std::fmt::Debug for Materializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Materializer")
            .field("cache_root", &self.cache_root)
            .field("downloads", &self.download_count())
            .finish()
    }
}
