//! Query engine runtime
//!
//! `QueryEngine` owns the controller event loop on a tokio task. Inputs go in
//! through the unbounded event queue; after every event the controller's
//! rendered [`DisplayState`] is published on a watch channel, so hosts read a
//! consistent snapshot at any time without touching engine internals.

use kokkai_core::auth::{AuthProvider, AuthState, HttpAuthProvider};
use kokkai_core::config::Config;
use kokkai_core::error::KokkaiResult;
use kokkai_core::pipeline::{Controller, DisplayState, Event, HttpStreamOpener};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Everything the engine runs against: configuration, a shared HTTP client,
/// and the source of auth settings and tokens
#[derive(Clone)]
pub struct SessionContext {
    /// Backend configuration
    pub config: Config,
    /// HTTP client shared by streams and the auth settings fetch
    pub http: reqwest::Client,
    /// Auth settings and token source
    pub auth: Arc<dyn AuthProvider>,
}

impl SessionContext {
    /// Build a context from the process environment; a `.env` file is
    /// honored when present
    pub fn from_env() -> KokkaiResult<Self> {
        dotenv::dotenv().ok();
        Ok(Self::new(Config::from_env()?))
    }

    /// Build a context around an explicit configuration
    pub fn new(config: Config) -> Self {
        let http = reqwest::Client::new();
        let auth = Arc::new(HttpAuthProvider::new(http.clone(), config.clone()));
        Self { config, http, auth }
    }

    /// Substitute the auth provider
    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = auth;
        self
    }
}

/// Handle to a running query engine
pub struct QueryEngine {
    events: mpsc::UnboundedSender<Event>,
    display: watch::Receiver<DisplayState>,
}

impl QueryEngine {
    /// Start the engine: spawns the controller loop and kicks off auth
    /// resolution. Must be called within a tokio runtime.
    pub fn start(context: SessionContext) -> KokkaiResult<Self> {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let opener =
            HttpStreamOpener::new(context.http.clone(), &context.config, events_tx.clone())?;
        let mut controller = Controller::new(opener);
        let (display_tx, display_rx) = watch::channel(controller.display());

        let auth = context.auth.clone();
        let auth_events = events_tx.clone();
        tokio::spawn(async move {
            if let Some(state) = resolve_auth(auth.as_ref()).await {
                // The loop having exited already just means shutdown won.
                let _ = auth_events.send(Event::AuthChanged(state));
            }
        });

        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                let last = matches!(event, Event::Shutdown);
                controller.handle(event);
                let _ = display_tx.send(controller.display());
                if last {
                    break;
                }
            }
            tracing::debug!("engine event loop stopped");
        });

        Ok(Self {
            events: events_tx,
            display: display_rx,
        })
    }

    /// Submit a question, superseding any previous one
    pub fn submit_question(&self, question: impl Into<String>) {
        let _ = self.events.send(Event::question(question));
    }

    /// Select a candidate speech window
    pub fn select_speech(&self, speech_id: impl Into<String>, position: u64) {
        let _ = self.events.send(Event::select(speech_id, position));
    }

    /// Hand the engine a signed-in user's bearer token; sign-in itself
    /// happens outside the engine
    pub fn sign_in(&self, token: impl Into<String>) {
        let _ = self
            .events
            .send(Event::AuthChanged(AuthState::SignedIn(token.into())));
    }

    /// Drop the bearer token; pending intents wait for the next sign-in
    pub fn sign_out(&self) {
        let _ = self
            .events
            .send(Event::AuthChanged(AuthState::AwaitingSignIn));
    }

    /// Current display snapshot
    pub fn snapshot(&self) -> DisplayState {
        self.display.borrow().clone()
    }

    /// Watch receiver that yields a fresh snapshot after every event
    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.display.clone()
    }

    /// Tear the engine down, closing any live streams
    pub fn shutdown(&self) {
        let _ = self.events.send(Event::Shutdown);
    }
}

/// Resolve the initial auth state from the provider.
///
/// A fetch failure leaves the engine pending rather than dead: no auth event
/// is posted, intents stay deferred, and the host can rebuild the engine.
async fn resolve_auth(auth: &dyn AuthProvider) -> Option<AuthState> {
    match auth.settings().await {
        Ok(settings) => {
            let mut state = AuthState::from_settings(&settings);
            if matches!(state, AuthState::AwaitingSignIn) {
                if let Some(token) = auth.current_token().await {
                    state = AuthState::SignedIn(token);
                }
            }
            // The state may carry a bearer token; log only its shape.
            let label = match &state {
                AuthState::Anonymous => "anonymous",
                AuthState::SignedIn(_) => "signed_in",
                AuthState::AwaitingSignIn => "awaiting_sign_in",
                AuthState::Unsupported => "unsupported",
                AuthState::Unknown => "unknown",
            };
            tracing::debug!(state = label, "auth resolved");
            Some(state)
        }
        Err(e) => {
            tracing::warn!(error = %e, "auth settings unavailable, engine stays pending");
            None
        }
    }
}
