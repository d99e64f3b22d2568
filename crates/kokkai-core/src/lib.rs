//! Kokkai Assist Core Library
//!
//! This crate implements the streaming query engine behind Kokkai Assist:
//! opening and decoding the search and summarize SSE streams, reconciling
//! them against the user's current question and selection, and aggregating
//! token usage and cost across both.

pub mod api;
pub mod auth;
pub mod config;
pub mod cost;
pub mod error;
pub mod pipeline;
pub mod stream;
pub mod types;
pub mod usage;

// Re-export commonly used types
pub use api::{
    ChatModelInfo, ModelPrice, SearchSpeechesResult, Speech, StreamPayload,
    SummarizeSpeechResult, TerminalResult,
};
pub use auth::{AuthProvider, AuthSettings, AuthState, HttpAuthProvider, StaticAuthProvider};
pub use config::Config;
pub use cost::CostEstimate;
pub use error::{KokkaiError, KokkaiResult};
pub use pipeline::{Controller, DisplayState, Event, HttpStreamOpener, StageView, StreamOpener};
pub use stream::{SessionEnd, SessionHandle, SessionState};
pub use types::{QueryKey, SelectionKey, SummarizeKey};
pub use usage::{Direction, UsageTotals};
