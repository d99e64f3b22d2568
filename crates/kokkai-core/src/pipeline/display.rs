//! Snapshot of what should currently be displayed
//!
//! The controller reduces events into its own state; after every event it can
//! render that state into a [`DisplayState`], a cheap-to-clone value the
//! presentation layer reads without touching the controller.

use crate::api::{SearchSpeechesResult, SummarizeSpeechResult};
use crate::auth::AuthState;
use crate::cost::CostEstimate;
use crate::types::SelectionKey;
use crate::usage::UsageTotals;

/// View of one stage
#[derive(Debug, Clone)]
pub struct StageView<T> {
    /// Latest progress string, while the stream is still working
    pub progress: Option<String>,
    /// The terminal result, once it has arrived for the current key
    pub result: Option<T>,
    /// Whether the terminal result answers the current desired key
    pub complete: bool,
    /// Usage folded for the current request
    pub usage: UsageTotals,
    /// Cost estimate, when the active model has a price schedule
    pub cost: Option<CostEstimate>,
    /// Name of the model that served the request, once known
    pub model: Option<String>,
}

/// The single source of truth for what should currently be displayed
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    /// The current question, if one has been submitted
    pub question: Option<String>,
    /// The active candidate selection, if any
    pub selection: Option<SelectionKey>,
    /// Whether the user must sign in before anything can stream
    pub sign_in_required: bool,
    /// Whether auth settings are still unresolved
    pub auth_pending: bool,
    /// Search stage view
    pub search: StageView<SearchSpeechesResult>,
    /// Summarize stage view
    pub summarize: StageView<SummarizeSpeechResult>,
}

impl<T> Default for StageView<T> {
    fn default() -> Self {
        Self {
            progress: None,
            result: None,
            complete: false,
            usage: UsageTotals::new(),
            cost: None,
            model: None,
        }
    }
}

impl DisplayState {
    /// Derive the auth flags from the resolved state
    pub(crate) fn with_auth(mut self, auth: &AuthState) -> Self {
        self.auth_pending = matches!(auth, AuthState::Unknown);
        self.sign_in_required = matches!(auth, AuthState::AwaitingSignIn);
        self
    }
}
