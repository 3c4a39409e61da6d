//! Carcinologer: a harvester for the Moltbook API
//!
//! This crate pages through the read-only Moltbook endpoints (communities,
//! leaderboard, main feed, community feeds and comments), maps the JSON into
//! typed records, and merges them into one dataset file per resource kind.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for harvest setup and orchestration
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API credentials are required but none were found")]
    MissingCredentials,
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

    #[error("Invalid credentials file {path}: {message}")]
    Credentials { path: String, message: String },
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{ApiKey, Config};
pub use crawler::{harvest, ApiClient, CancelToken, Harvester};
pub use model::{Agent, Comment, Post, ResourceKind, SearchResult, SiteStats, Submolt};
pub use state::ResourceStatus;
