//! Kokkai Assist SDK
//!
//! This crate provides a high-level entry point for running the Kokkai
//! Assist query engine programmatically: construct a [`SessionContext`],
//! start a [`QueryEngine`], feed it questions and selections, and watch the
//! reconciled [`DisplayState`] snapshots.
//!
//! # Example
//!
//! ```rust,no_run
//! use kokkai_sdk::{QueryEngine, SessionContext};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let engine = QueryEngine::start(SessionContext::from_env()?)?;
//! engine.submit_question("消費税について");
//!
//! let mut display = engine.subscribe();
//! while display.changed().await.is_ok() {
//!     let snapshot = display.borrow().clone();
//!     if snapshot.summarize.complete {
//!         break;
//!     }
//! }
//! engine.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod engine;

pub use engine::{QueryEngine, SessionContext};

// Re-export commonly used types from core
pub use kokkai_core::{
    api::{SearchSpeechesResult, Speech, SummarizeSpeechResult},
    auth::{AuthProvider, AuthState, StaticAuthProvider},
    config::Config,
    error::{KokkaiError, KokkaiResult},
    pipeline::DisplayState,
    types::{QueryKey, SelectionKey, SummarizeKey},
};
