//! Harvester module for the Moltbook API
//!
//! This module contains the fetch engine, including:
//! - The API client with bearer auth, retry and backoff
//! - Request spacing shared by every call a client makes
//! - Cursor pagination into deduplicated record sets
//! - Mapping raw JSON objects to typed records
//! - Overall harvest coordination and persistence

mod coordinator;
mod fetcher;
mod paginator;
mod parser;
mod scheduler;

pub use coordinator::{HarvestData, HarvestReport, Harvester, ResourceReport};
pub use fetcher::{build_http_client, ApiClient, Endpoint, EndpointPages, RetryPolicy};
pub use paginator::{PageFetcher, PageOutcome, Paginator, Termination};
pub use parser::{map_record, map_search_result, MapContext};
pub use scheduler::RateLimiter;

use crate::config::{resolve_credentials, Config};
use crate::HarvestError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by a single API call after retries are exhausted
///
/// Connection-level failures, 5xx and 429 responses are retried inside the
/// client and only appear here as `Transient` once the attempt bound is hit.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{path} still failing after {attempts} attempts: {message}")]
    Transient {
        path: String,
        status: Option<u16>,
        attempts: u32,
        message: String,
    },

    #[error("{path} rejected with HTTP {status}: {body}")]
    Request {
        path: String,
        status: u16,
        body: String,
    },

    #[error("{path} requires a valid API key")]
    Unauthenticated { path: String },

    #[error("Invalid JSON from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Response from {path} has no '{key}' array")]
    Envelope { path: String, key: &'static str },

    #[error("Cannot build a request URL for {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Whether this is the 401 condition that pagination degrades on
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated { .. })
    }

    /// HTTP status behind the error, if there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transient { status, .. } => *status,
            Self::Request { status, .. } => Some(*status),
            Self::Unauthenticated { .. } => Some(401),
            _ => None,
        }
    }
}

/// Cooperative cancellation flag shared between the caller and a harvest
///
/// Checked between page requests and between resources; a request already
/// in flight always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs a complete harvest
///
/// This is the main entry point for a run. It will:
/// 1. Resolve the API key
/// 2. Build the API client
/// 3. Fetch every resource kind in turn
/// 4. Merge the results into the dataset files
/// 5. Write the run summary
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `config_hash` - Hash recorded in the run summary
/// * `include_comments` - Whether to fetch comments for posts that have any
/// * `cancel` - Flag checked between requests
///
/// # Returns
///
/// * `Ok(HarvestReport)` - The run finished, possibly with failed resources
/// * `Err(HarvestError)` - Setup failed before any request was sent
pub async fn harvest(
    config: Config,
    config_hash: String,
    include_comments: bool,
    cancel: CancelToken,
) -> Result<HarvestReport, HarvestError> {
    let api_key = resolve_credentials(&config.api)?;
    if api_key.is_none() {
        if config.api.require_credentials {
            return Err(HarvestError::MissingCredentials);
        }
        tracing::warn!("No API key configured; authenticated endpoints will return nothing");
    }

    let client = ApiClient::new(&config, api_key)?;
    let harvester = Harvester::new(config, config_hash, client, cancel);
    Ok(harvester.run(include_comments).await)
}
