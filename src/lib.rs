//! Notion-Harvest: a crawl-decode-resolve pipeline for Notion workspaces
//!
//! This crate discovers every page and database reachable from a single root
//! id, fetches each object exactly once with bounded concurrency, decodes the
//! block trees into normalized units plus HTML markup, and defers every
//! cross-page link and file attachment behind placeholder tokens that the
//! caller resolves once target paths are known.

pub mod attachments;
pub mod config;
pub mod crawler;
pub mod decode;
pub mod id;
pub mod model;
pub mod output;
pub mod registry;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

use std::path::Path;
use thiserror::Error;

/// Main error type for Notion-Harvest operations
///
/// Only crawl-fatal conditions and caller misuse surface here. Per-object
/// failures are recorded on the affected page as [`PageError`]s instead.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid object id: {0}")]
    InvalidId(String),

    #[error("Root object {id} could not be fetched: {source}")]
    RootUnavailable { id: String, source: FetchError },

    #[error("Credential rejected while fetching {id}: {message}")]
    Unauthorized { id: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crawl worker failed: {0}")]
    Worker(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("No Notion token configured (set api.token or NOTION_TOKEN)")]
    MissingToken,
}

/// Failure of a single remote request, as classified by the transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("object not found")]
    NotFound,

    #[error("access forbidden")]
    Forbidden,

    #[error("request rejected with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("credential rejected: {0}")]
    Unauthorized(String),

    #[error("gave up after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Returns true if this failure must abort the whole crawl
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Returns true if the object is simply absent (or of another kind)
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::NotFound | Self::Rejected { status: 400, .. })
    }
}

/// Non-fatal problem recorded on a decoded page
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PageError {
    #[error("Fetch failed: {0}")]
    Fetch(FetchError),

    #[error("Unsupported block type '{type_tag}' (block {unit_id})")]
    UnsupportedUnit { unit_id: String, type_tag: String },

    #[error("Malformed {type_tag} block {unit_id}: {reason}")]
    MalformedUnit {
        unit_id: String,
        type_tag: String,
        reason: String,
    },

    #[error("Children of block {unit_id} could not be fetched: {error}")]
    UnreadableChildren { unit_id: String, error: FetchError },

    #[error("Unsupported property type '{type_tag}' for property '{name}'")]
    UnsupportedProperty { name: String, type_tag: String },

    #[error("No name known for user {user_id}; showing the id instead")]
    UnknownUser { user_id: String },

    #[error("Attachment {source_url} could not be materialized: {message}")]
    Attachment { source_url: String, message: String },
}

/// Result type alias for Notion-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use output::{CrawlResult, DatabaseSummary, DecodedPage};
pub use registry::{AttachmentToken, LinkToken, PlaceholderRegistry, Token};
pub use state::{ObjectKind, ObjectRef};

/// Crawls everything reachable from `root_id` with default settings
///
/// `credential` is the Notion integration token. Attachments downloaded
/// later are cached under `destination_root` (a fresh run directory under
/// the system temp dir when `None`).
///
/// # Example
///
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let root = "0123456789abcdef0123456789abcdef";
/// let mut result = notion_harvest::crawl(root, "secret_x", None).await?;
/// result.resolve_all_links("./");
/// for page in result.pages() {
///     println!("{} -> {} bytes", page.title(), page.updated_markup().len());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn crawl(
    root_id: &str,
    credential: &str,
    destination_root: Option<&Path>,
) -> Result<CrawlResult> {
    let mut config = Config::default();
    config.api.token = Some(credential.to_string());
    config.output.destination_root = destination_root.map(Path::to_path_buf);
    crawler::crawl(config, root_id).await
}
