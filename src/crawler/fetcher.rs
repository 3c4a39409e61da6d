//! Moltbook API client
//!
//! This module handles every HTTP request the harvester makes, including:
//! - Building the HTTP client with the configured user agent and timeouts
//! - Bearer authentication when an API key is available
//! - Request spacing through the client's [`RateLimiter`]
//! - Retry with exponential backoff for transient failures
//! - Classifying failures into [`FetchError`] variants

use crate::config::{ApiKey, Config, FetchConfig};
use crate::crawler::paginator::PageFetcher;
use crate::crawler::parser::map_search_result;
use crate::crawler::scheduler::RateLimiter;
use crate::crawler::FetchError;
use crate::model::{SearchResult, SiteStats};
use crate::HarvestError;
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Longest error body kept in a [`FetchError::Request`]
const MAX_ERROR_BODY: usize = 200;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The harvester configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    // Format: Name/Version (+ContactURL)
    let user_agent = config.user_agent.header_value();

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.api.timeout_secs))
        .connect_timeout(Duration::from_secs(config.api.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Read-only endpoints the harvester knows about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `GET /submolts`
    Submolts,
    /// `GET /agents/leaderboard`
    Leaderboard,
    /// `GET /posts`
    Feed,
    /// `GET /submolts/{name}/feed`
    SubmoltFeed(String),
    /// `GET /posts/{id}/comments`
    Comments(String),
    /// `GET /search`
    Search,
}

impl Endpoint {
    fn segments(&self) -> Vec<&str> {
        match self {
            Self::Submolts => vec!["submolts"],
            Self::Leaderboard => vec!["agents", "leaderboard"],
            Self::Feed => vec!["posts"],
            Self::SubmoltFeed(name) => vec!["submolts", name, "feed"],
            Self::Comments(post_id) => vec!["posts", post_id, "comments"],
            Self::Search => vec!["search"],
        }
    }

    /// Display path, used in logs and errors
    pub fn path(&self) -> String {
        format!("/{}", self.segments().join("/"))
    }

    /// Key of the array inside the response envelope
    pub fn envelope(&self) -> &'static str {
        match self {
            Self::Submolts => "submolts",
            Self::Leaderboard => "leaderboard",
            Self::Feed | Self::SubmoltFeed(_) => "posts",
            Self::Comments(_) => "comments",
            Self::Search => "results",
        }
    }

    /// Whether a 401 here means "no valid key" rather than a bad request
    pub fn requires_auth(&self) -> bool {
        !matches!(self, Self::Submolts | Self::Leaderboard)
    }

    /// Snapshot endpoints return everything in one response and ignore cursors
    pub fn is_paginated(&self) -> bool {
        matches!(self, Self::Feed | Self::SubmoltFeed(_) | Self::Comments(_))
    }
}

/// Retry bound and backoff schedule for transient failures
///
/// The delay before retry `n` (1-based) is `base_delay * 2^(n-1)`, capped at
/// `max_delay`. A server-sent `Retry-After` raises the delay, never lowers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before the retry that follows failed attempt number `attempt`
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let backoff = self.base_delay.saturating_mul(factor).min(self.max_delay);
        match retry_after {
            Some(hint) if hint > backoff => hint.min(self.max_delay),
            _ => backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// Outcome of one attempt that did not produce a body
enum AttemptError {
    /// Worth retrying: connection failure, 5xx or 429
    Retryable {
        status: Option<u16>,
        message: String,
        retry_after: Option<Duration>,
    },
    Fatal(FetchError),
}

/// Client for the Moltbook API
///
/// One instance owns one HTTP session, one API key and one request clock.
/// The session is released when the client is closed or dropped.
pub struct ApiClient {
    http: Client,
    base_url: Url,
    api_key: Option<ApiKey>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    feed_sort: String,
    comment_sort: String,
    requests: AtomicU64,
}

impl ApiClient {
    /// Creates a client from the configuration and an already-resolved key
    ///
    /// # Returns
    ///
    /// * `Ok(ApiClient)` - Ready to send requests
    /// * `Err(HarvestError)` - The base URL is invalid or the HTTP client could not be built
    pub fn new(config: &Config, api_key: Option<ApiKey>) -> Result<Self, HarvestError> {
        let base_url = Url::parse(&config.api.base_url)?;
        let http = build_http_client(config)?;

        let limiter = RateLimiter::new(Duration::from_millis(config.fetch.min_request_interval_ms));
        debug!(
            "HTTP session opened for {} ({}, requests at least {:?} apart)",
            base_url,
            if api_key.is_some() { "authenticated" } else { "anonymous" },
            limiter.interval()
        );

        Ok(Self {
            http,
            base_url,
            api_key,
            limiter,
            retry: RetryPolicy::from_config(&config.fetch),
            feed_sort: config.fetch.sort.clone(),
            comment_sort: config.fetch.comment_sort.clone(),
            requests: AtomicU64::new(0),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Number of HTTP requests sent so far, retries included
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Releases the HTTP session
    pub fn close(self) {
        drop(self);
    }

    /// Platform totals reported by the community list
    pub async fn get_stats(&self) -> Result<SiteStats, FetchError> {
        let endpoint = Endpoint::Submolts;
        let body = self.send(&endpoint, &[]).await?;
        serde_json::from_value(body).map_err(|source| FetchError::Decode {
            path: endpoint.path(),
            source,
        })
    }

    /// Fetches one page of raw objects from `endpoint`
    ///
    /// Snapshot endpoints answer the first call and return an empty page for
    /// any later cursor without sending a request.
    pub async fn fetch_page(
        &self,
        endpoint: &Endpoint,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Value>, FetchError> {
        if !endpoint.is_paginated() {
            if cursor.is_some() {
                return Ok(Vec::new());
            }
            let body = self.send(endpoint, &[]).await?;
            return take_envelope(body, endpoint);
        }

        let sort = match endpoint {
            Endpoint::Comments(_) => &self.comment_sort,
            _ => &self.feed_sort,
        };
        let mut query: Vec<(&str, String)> =
            vec![("sort", sort.clone()), ("limit", limit.to_string())];
        if let Some(before) = cursor {
            query.push(("before", before.to_string()));
        }

        let body = self.send(endpoint, &query).await?;
        take_envelope(body, endpoint)
    }

    /// Runs a search query; results are mapped but never persisted
    ///
    /// Malformed hits are skipped with a warning.
    pub async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchResult>, FetchError> {
        let endpoint = Endpoint::Search;
        let params = [("q", query.to_string()), ("limit", limit.to_string())];
        let body = self.send(&endpoint, &params).await?;

        let results = take_envelope(body, &endpoint)?
            .iter()
            .filter_map(|raw| match map_search_result(raw) {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!("Skipping search result: {}", e);
                    None
                }
            })
            .collect();
        Ok(results)
    }

    /// A [`PageFetcher`] over one endpoint of this client
    pub fn pages(&self, endpoint: Endpoint) -> EndpointPages<'_> {
        EndpointPages {
            client: self,
            endpoint,
        }
    }

    fn url_for(&self, endpoint: &Endpoint, query: &[(&str, String)]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(endpoint.path()))?
            .pop_if_empty()
            .extend(endpoint.segments());

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Sends a GET and returns the decoded JSON body
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx | Decode and return |
    /// | Connection error, timeout | Retry with backoff |
    /// | HTTP 5xx | Retry with backoff |
    /// | HTTP 429 | Retry, honoring a numeric `Retry-After` |
    /// | HTTP 401 on an authenticated endpoint | Immediate → `Unauthenticated` |
    /// | Any other 4xx | Immediate → `Request` |
    pub async fn send(
        &self,
        endpoint: &Endpoint,
        query: &[(&str, String)],
    ) -> Result<Value, FetchError> {
        let url = self.url_for(endpoint, query)?;
        let path = endpoint.path();
        let mut attempt = 0;

        loop {
            attempt += 1;

            self.limiter.throttle().await;
            let outcome = self.attempt(&url, &path, endpoint.requires_auth()).await;
            self.limiter.complete().await;

            match outcome {
                Ok(body) => {
                    debug!("GET {} succeeded on attempt {}", path, attempt);
                    return Ok(body);
                }
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Retryable {
                    status,
                    message,
                    retry_after,
                }) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(FetchError::Transient {
                            path,
                            status,
                            attempts: attempt,
                            message,
                        });
                    }

                    let delay = self.retry.delay_for(attempt, retry_after);
                    warn!(
                        "GET {} failed ({}), retrying in {:?} (attempt {}/{})",
                        path,
                        message,
                        delay,
                        attempt + 1,
                        self.retry.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(&self, url: &Url, path: &str, requires_auth: bool) -> Result<Value, AttemptError> {
        let mut request = self
            .http
            .get(url.clone())
            .header(ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose());
        }

        self.requests.fetch_add(1, Ordering::Relaxed);
        let response = request.send().await.map_err(network_error)?;
        let status = response.status();

        if status.is_success() {
            let text = response.text().await.map_err(network_error)?;
            return serde_json::from_str(&text).map_err(|source| {
                AttemptError::Fatal(FetchError::Decode {
                    path: path.to_string(),
                    source,
                })
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(AttemptError::Retryable {
                status: Some(status.as_u16()),
                message: format!("HTTP {}", status),
                retry_after: parse_retry_after(response.headers()),
            });
        }

        if status == StatusCode::UNAUTHORIZED && requires_auth {
            return Err(AttemptError::Fatal(FetchError::Unauthenticated {
                path: path.to_string(),
            }));
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|&i| body.is_char_boundary(i))
                .unwrap_or(0);
            body.truncate(cut);
        }

        Err(AttemptError::Fatal(FetchError::Request {
            path: path.to_string(),
            status: status.as_u16(),
            body,
        }))
    }
}

impl Drop for ApiClient {
    fn drop(&mut self) {
        debug!(
            "HTTP session for {} closed after {} requests",
            self.base_url,
            self.request_count()
        );
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Pages of one endpoint, fetched through an [`ApiClient`]
#[derive(Debug)]
pub struct EndpointPages<'a> {
    client: &'a ApiClient,
    endpoint: Endpoint,
}

impl EndpointPages<'_> {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl PageFetcher for EndpointPages<'_> {
    async fn fetch_page(&self, cursor: Option<&str>, limit: u32) -> Result<Vec<Value>, FetchError> {
        self.client.fetch_page(&self.endpoint, cursor, limit).await
    }
}

fn network_error(e: reqwest::Error) -> AttemptError {
    let message = if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        "connection failed".to_string()
    } else {
        e.to_string()
    };
    AttemptError::Retryable {
        status: None,
        message,
        retry_after: None,
    }
}

/// Seconds form of `Retry-After`; HTTP-date values are ignored
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Pulls the record array out of a response envelope
///
/// A bare array is accepted as-is and a `null` envelope is an empty page.
fn take_envelope(body: Value, endpoint: &Endpoint) -> Result<Vec<Value>, FetchError> {
    let key = endpoint.envelope();
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) => Ok(Vec::new()),
            _ => Err(FetchError::Envelope {
                path: endpoint.path(),
                key,
            }),
        },
        _ => Err(FetchError::Envelope {
            path: endpoint.path(),
            key,
        }),
    }
}
