use serde::Deserialize;
use std::path::PathBuf;

/// Default API root for Moltbook
pub const DEFAULT_BASE_URL: &str = "https://www.moltbook.com/api/v1";

/// Main configuration structure for Carcinologer
///
/// Every section and key is optional in the TOML file; anything left out takes
/// the value from the corresponding `Default` impl.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub fetch: FetchConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Remote API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Root of the versioned API, e.g. `https://www.moltbook.com/api/v1`
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// TCP connect timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Refuse to start when no API key can be resolved
    #[serde(rename = "require-credentials")]
    pub require_credentials: bool,

    /// Overrides `~/.config/moltbook/credentials.json`
    #[serde(rename = "credentials-path")]
    pub credentials_path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            require_credentials: false,
            credentials_path: None,
        }
    }
}

/// Pagination, pacing and retry behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Records requested per page (the API caps this at 100)
    #[serde(rename = "page-size")]
    pub page_size: u32,

    /// Sort order for the main and community feeds
    pub sort: String,

    /// Sort order for comment listings
    #[serde(rename = "comment-sort")]
    pub comment_sort: String,

    /// Minimum time between the end of one request and the start of the next (milliseconds)
    #[serde(rename = "min-request-interval-ms")]
    pub min_request_interval_ms: u64,

    /// Attempts per request, including the first
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubled on every further retry (milliseconds)
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for any single backoff delay (milliseconds)
    #[serde(rename = "max-backoff-ms")]
    pub max_backoff_ms: u64,

    /// Stop each feed after this many posts
    #[serde(rename = "max-posts")]
    pub max_posts: Option<usize>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            sort: "new".to_string(),
            comment_sort: "top".to_string(),
            min_request_interval_ms: 500,
            max_attempts: 3,
            backoff_base_ms: 2000,
            max_backoff_ms: 30_000,
            max_posts: None,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the harvester
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the harvester
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the harvester
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "carcinologer".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://github.com/carcinologer/carcinologer".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the `User-Agent` header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory holding one dataset file per resource kind
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,

    /// Path to the markdown run summary
    #[serde(rename = "summary-path")]
    pub summary_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            summary_path: PathBuf::from("./data/summary.md"),
        }
    }
}
