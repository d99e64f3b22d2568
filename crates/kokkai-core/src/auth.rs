//! Authentication settings and sign-in state
//!
//! The backend advertises its auth mode through `/auth_settings` (or the
//! same document inlined via configuration). The engine itself never signs
//! anybody in; tokens arrive from outside through an auth event, and the
//! pipeline only gates stream opening on the resulting [`AuthState`].

use crate::config::{timeouts, Config};
use crate::error::{KokkaiError, KokkaiResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Auth configuration advertised by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthSettings {
    /// Auth disabled; requests carry no bearer
    None,
    /// Firebase-backed auth; sign-in happens outside the engine
    Firebase {
        #[serde(rename = "firebaseConfig")]
        firebase_config: serde_json::Value,
    },
    /// Unrecognized configuration; streaming is permanently disabled
    #[serde(other)]
    Unsupported,
}

/// Resolved sign-in state, as seen by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// Settings not yet known; stream opening is deferred, not dropped
    Unknown,
    /// Auth disabled; streams open without a bearer
    Anonymous,
    /// Auth enabled but nobody is signed in yet
    AwaitingSignIn,
    /// Signed in; streams carry this bearer token
    SignedIn(String),
    /// Unrecognized configuration; streams can never open
    Unsupported,
}

impl AuthState {
    /// Initial state implied by the advertised settings
    pub fn from_settings(settings: &AuthSettings) -> Self {
        match settings {
            AuthSettings::None => Self::Anonymous,
            AuthSettings::Firebase { .. } => Self::AwaitingSignIn,
            AuthSettings::Unsupported => Self::Unsupported,
        }
    }

    /// Whether streams may be opened in this state
    pub fn allows_streams(&self) -> bool {
        matches!(self, Self::Anonymous | Self::SignedIn(_))
    }

    /// Bearer token to attach, when one is known
    pub fn bearer(&self) -> Option<&str> {
        match self {
            Self::SignedIn(token) => Some(token),
            _ => None,
        }
    }
}

/// Source of auth settings and tokens, in the shape the engine consumes.
///
/// Real sign-in flows (Firebase popups and the like) live behind this seam;
/// the engine only ever asks for the settings document and the current token.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The advertised auth settings
    async fn settings(&self) -> KokkaiResult<AuthSettings>;
    /// The signed-in user's bearer token, if any
    async fn current_token(&self) -> Option<String>;
}

/// Provider with fixed settings and an optional fixed token
#[derive(Debug, Clone)]
pub struct StaticAuthProvider {
    settings: AuthSettings,
    token: Option<String>,
}

impl StaticAuthProvider {
    /// Auth disabled
    pub fn anonymous() -> Self {
        Self {
            settings: AuthSettings::None,
            token: None,
        }
    }

    /// Fixed settings, no token
    pub fn new(settings: AuthSettings) -> Self {
        Self {
            settings,
            token: None,
        }
    }

    /// Attach a fixed token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn settings(&self) -> KokkaiResult<AuthSettings> {
        Ok(self.settings.clone())
    }

    async fn current_token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Provider that fetches `/auth_settings` from the backend once per call,
/// honoring settings inlined through configuration
pub struct HttpAuthProvider {
    client: reqwest::Client,
    config: Config,
}

impl HttpAuthProvider {
    /// Create a provider against the configured backend
    pub fn new(client: reqwest::Client, config: Config) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn settings(&self) -> KokkaiResult<AuthSettings> {
        if let Some(inline) = &self.config.auth_settings_inline {
            let settings = serde_json::from_str(inline)
                .map_err(|e| KokkaiError::auth(format!("invalid inline auth settings: {e}")))?;
            tracing::debug!("auth settings loaded from configuration");
            return Ok(settings);
        }
        let url = self.config.base_url()?.join("auth_settings")?;
        let settings = self
            .client
            .get(url)
            .timeout(timeouts::http::auth_settings_timeout())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        tracing::debug!("auth settings loaded from backend");
        Ok(settings)
    }

    async fn current_token(&self) -> Option<String> {
        // Sign-in is external; this provider never holds a token itself.
        None
    }
}
