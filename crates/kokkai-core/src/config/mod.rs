//! Engine configuration
//!
//! Configuration is environment-driven: the API host, an optional inline auth
//! settings document, and an optional stream timeout override. Auth settings
//! inlined through the environment skip the `/auth_settings` fetch at startup.

pub mod timeouts;

use crate::error::{KokkaiError, KokkaiResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Environment variable naming the API base URL
pub const ENV_API_BASE: &str = "KOKKAI_API_BASE";
/// Environment variable carrying inline auth settings JSON
pub const ENV_AUTH_SETTINGS: &str = "KOKKAI_AUTH_SETTINGS";
/// Environment variable overriding the stream timeout, in seconds
pub const ENV_STREAM_TIMEOUT_SECS: &str = "KOKKAI_STREAM_TIMEOUT_SECS";

/// Default API base when none is configured
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/";

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the backend API
    pub api_base: String,
    /// Inline auth settings JSON, bypassing the `/auth_settings` fetch
    pub auth_settings_inline: Option<String>,
    /// Hard wall-clock budget for each server-push stream, in seconds
    pub stream_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            auth_settings_inline: None,
            stream_timeout_secs: timeouts::stream::HARD_SECS,
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> KokkaiResult<Self> {
        let mut config = Self::default();

        if let Ok(base) = std::env::var(ENV_API_BASE) {
            if !base.trim().is_empty() {
                config.api_base = base;
            }
        }
        if let Ok(settings) = std::env::var(ENV_AUTH_SETTINGS) {
            if settings.trim_start().starts_with('{') {
                config.auth_settings_inline = Some(settings);
            }
        }
        if let Ok(secs) = std::env::var(ENV_STREAM_TIMEOUT_SECS) {
            config.stream_timeout_secs = secs.parse().map_err(|_| {
                KokkaiError::config(format!("{ENV_STREAM_TIMEOUT_SECS} must be an integer"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the API base URL
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Set the stream timeout
    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout_secs = timeout.as_secs();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> KokkaiResult<()> {
        self.base_url()?;
        if self.stream_timeout_secs == 0 {
            return Err(KokkaiError::config("stream timeout must be non-zero"));
        }
        Ok(())
    }

    /// Parse the API base as a URL, guaranteeing a trailing slash so that
    /// endpoint paths join below it rather than replacing the last segment
    pub fn base_url(&self) -> KokkaiResult<Url> {
        let raw = if self.api_base.ends_with('/') {
            self.api_base.clone()
        } else {
            format!("{}/", self.api_base)
        };
        Url::parse(&raw)
            .map_err(|e| KokkaiError::config(format!("invalid API base {:?}: {e}", self.api_base)))
    }

    /// Hard stream timeout as a Duration
    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }
}
