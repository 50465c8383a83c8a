//! Configuration module for Notion-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use notion_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("API base: {}", config.api.base_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ApiConfig, Config, CrawlerConfig, OutputConfig, TOKEN_ENV_VAR};

// Re-export parser functions
pub use parser::{load_config, parse_config};
pub use validation::validate;
