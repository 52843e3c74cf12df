//! crates/relevamiento_client/src/config.rs
//!
//! Configuration of a survey client, loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the survey API, without a trailing slash.
    pub api_base_url: String,
    /// Upper bound for every request, so a submit can never hang.
    pub request_timeout: Duration,
    /// Directory for durable client state. `None` keeps nothing across runs.
    pub storage_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            request_timeout: Duration::from_secs(15),
            storage_path: None,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from environment variables, reading `.env` first
    /// outside of tests.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_base_url = match lookup("API_BASE_URL") {
            Some(raw) => {
                let url = raw.trim().trim_end_matches('/').to_string();
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::InvalidValue(
                        "API_BASE_URL".to_string(),
                        format!("'{}' is not an http(s) URL", raw),
                    ));
                }
                url
            }
            None => defaults.api_base_url,
        };

        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "REQUEST_TIMEOUT_SECS".to_string(),
                        format!("'{}' is not a positive number of seconds", raw),
                    ))
                }
            },
            None => defaults.request_timeout,
        };

        let storage_path = lookup("STORAGE_PATH")
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            api_base_url,
            request_timeout,
            storage_path,
        })
    }
}
