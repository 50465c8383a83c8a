use crate::config::types::{ApiConfig, Config, CrawlerConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound on concurrent fetches; Notion rate limits far below this
const MAX_CONCURRENT_FETCHES: u32 = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_api_config(&config.api)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > MAX_CONCURRENT_FETCHES {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and {}, got {}",
            MAX_CONCURRENT_FETCHES, config.max_concurrent_fetches
        )));
    }

    Ok(())
}

/// Validates API transport configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if config.notion_version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "notion_version cannot be empty".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be > 0".to_string(),
        ));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if matches!(&config.token, Some(token) if token.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "token cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if matches!(&config.destination_root, Some(root) if root.as_os_str().is_empty()) {
        return Err(ConfigError::Validation(
            "destination_root cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}
