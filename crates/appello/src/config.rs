//! Configuration loading from environment variables.

use anyhow::{Context, Result};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SESSION_TTL_MINS: u64 = 8 * 60;

/// Settings for talking to the REST backend and the sign-in provider.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub google_client_id: Option<String>,
    pub request_timeout: Duration,
    /// Idle time after which a session is dropped.
    pub session_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            google_client_id: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_MINS * 60),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Reads `APPELLO_API_URL`, `APPELLO_GOOGLE_CLIENT_ID`,
    /// `APPELLO_REQUEST_TIMEOUT_SECS` and `APPELLO_SESSION_TTL_MINS`, either
    /// from the environment or from a `.env` file. All of them are optional.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = non_empty("APPELLO_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let google_client_id = non_empty("APPELLO_GOOGLE_CLIENT_ID");

        let number = |key: &str, default: u64| -> Result<u64> {
            match non_empty(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{key} is not a number: {raw}")),
                None => Ok(default),
            }
        };
        let request_timeout =
            Duration::from_secs(number("APPELLO_REQUEST_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?);
        let session_ttl =
            Duration::from_secs(number("APPELLO_SESSION_TTL_MINS", DEFAULT_SESSION_TTL_MINS)?.saturating_mul(60));

        Ok(Self {
            api_url,
            google_client_id,
            request_timeout,
            session_ttl,
        })
    }
}
