//! Configuration module for Carcinologer
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and resolving the API key from the environment or a credentials file.
//!
//! # Example
//!
//! ```no_run
//! use carcinologer::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("carcinologer.toml")).unwrap();
//! println!("Harvester will request {} records per page", config.fetch.page_size);
//! ```

mod credentials;
mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiConfig, Config, FetchConfig, OutputConfig, UserAgentConfig, DEFAULT_BASE_URL,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, default_config_hash, load_config, load_config_with_hash, parse_config,
};

pub use credentials::{
    default_credentials_path, resolve_api_key, resolve_credentials, ApiKey, API_KEY_ENV,
};
pub use validation::{validate, COMMENT_SORTS, FEED_SORTS, MAX_PAGE_SIZE};
