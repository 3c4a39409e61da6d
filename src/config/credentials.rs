//! API key resolution
//!
//! The key comes from `MOLTBOOK_API_KEY` when that is set and non-empty,
//! otherwise from a JSON credentials file (`{"api_key": "..."}`). The
//! resolved key is handed to the client constructor; nothing here is global.

use crate::config::types::ApiConfig;
use crate::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable consulted first
pub const API_KEY_ENV: &str = "MOLTBOOK_API_KEY";

/// A bearer token for the Moltbook API. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a key, rejecting blank input
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    /// Returns the raw token
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    api_key: Option<String>,
}

/// Default credentials file: `~/.config/moltbook/credentials.json`
pub fn default_credentials_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("moltbook").join("credentials.json"))
}

/// Resolves the API key for the given API configuration
///
/// Reads the process environment and then the configured (or default)
/// credentials file.
///
/// # Returns
///
/// * `Ok(Some(ApiKey))` - A key was found
/// * `Ok(None)` - No key is configured anywhere
/// * `Err(ConfigError)` - The credentials file exists but cannot be read or parsed
pub fn resolve_credentials(config: &ApiConfig) -> Result<Option<ApiKey>, ConfigError> {
    let env_value = std::env::var(API_KEY_ENV).ok();
    let path = config
        .credentials_path
        .clone()
        .or_else(default_credentials_path);
    resolve_api_key(env_value, path.as_deref())
}

/// Resolves an API key from an environment value and an optional file path
///
/// The environment value wins whenever it is non-empty. A missing file is not
/// an error.
pub fn resolve_api_key(
    env_value: Option<String>,
    file_path: Option<&Path>,
) -> Result<Option<ApiKey>, ConfigError> {
    if let Some(key) = env_value.and_then(ApiKey::new) {
        tracing::debug!("Using API key from {}", API_KEY_ENV);
        return Ok(Some(key));
    }

    let Some(path) = file_path else {
        return Ok(None);
    };

    if !path.exists() {
        tracing::debug!("No credentials file at {}", path.display());
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Credentials {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let parsed: CredentialsFile =
        serde_json::from_str(&content).map_err(|e| ConfigError::Credentials {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    let key = parsed.api_key.and_then(ApiKey::new);
    if key.is_some() {
        tracing::debug!("Using API key from {}", path.display());
    }
    Ok(key)
}
