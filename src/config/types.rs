use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Environment variable consulted when no token is configured
pub const TOKEN_ENV_VAR: &str = "NOTION_TOKEN";

/// Main configuration structure for Notion-Harvest
///
/// Every section is optional; `Config::default()` is a valid configuration
/// apart from the token, which may come from the environment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of object fetches in flight at once
    #[serde(rename = "max-concurrent-fetches", default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

/// Notion API transport configuration
#[derive(Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST API, without trailing slash
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Value of the `Notion-Version` header
    #[serde(rename = "notion-version", default = "default_notion_version")]
    pub notion_version: String,

    /// User agent sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per request before giving up
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Wait between attempts after a transient failure (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Integration token; falls back to `NOTION_TOKEN`
    #[serde(default)]
    pub token: Option<String>,
}

impl ApiConfig {
    /// Returns the configured token, or the one from the environment
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var(TOKEN_ENV_VAR).ok())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            notion_version: default_notion_version(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            token: None,
        }
    }
}

// Keeps the token out of logs
impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("notion_version", &self.notion_version)
            .field("user_agent", &self.user_agent)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Root of the attachment download cache; a fresh temp dir when unset
    #[serde(rename = "destination-root", default)]
    pub destination_root: Option<PathBuf>,
}

fn default_max_concurrent_fetches() -> u32 {
    8
}

fn default_base_url() -> String {
    "https://api.notion.com/v1".to_string()
}

fn default_notion_version() -> String {
    "2022-06-28".to_string()
}

fn default_user_agent() -> String {
    format!("notion-harvest/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    32
}

fn default_max_retries() -> u32 {
    4
}

fn default_retry_delay_ms() -> u64 {
    5000
}
