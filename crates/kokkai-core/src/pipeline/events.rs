//! The pipeline's unified event queue
//!
//! Every state transition in the engine happens on delivery of one of these
//! events: user input, auth resolution, a decoded payload from one of the
//! two streams, or a session's end disposition. Events from the two streams
//! may interleave arbitrarily; each stream delivery therefore carries the
//! request key of the session that produced it, so stale ones can be
//! discarded on arrival.

use crate::api::{SearchSpeechesResult, StreamPayload, SummarizeSpeechResult};
use crate::auth::AuthState;
use crate::stream::SessionEnd;
use crate::types::{QueryKey, SelectionKey, SummarizeKey};

/// One discrete input to the controller
#[derive(Debug, Clone)]
pub enum Event {
    /// The user submitted a question
    QuestionSubmitted(QueryKey),
    /// The user picked a candidate (auto-selection is internal, not an event)
    SelectionChanged(SelectionKey),
    /// Auth settings resolved, a user signed in, or signed out
    AuthChanged(AuthState),
    /// Decoded payload from a search session, tagged with its request key
    Search {
        key: QueryKey,
        payload: StreamPayload<SearchSpeechesResult>,
    },
    /// Decoded payload from a summarize session, tagged with its request key
    Summarize {
        key: SummarizeKey,
        payload: StreamPayload<SummarizeSpeechResult>,
    },
    /// A search session reached its end disposition
    SearchEnded { key: QueryKey, end: SessionEnd },
    /// A summarize session reached its end disposition
    SummarizeEnded { key: SummarizeKey, end: SessionEnd },
    /// Tear the engine down, closing both stages
    Shutdown,
}

impl Event {
    /// Submit a question
    pub fn question(question: impl Into<String>) -> Self {
        Self::QuestionSubmitted(QueryKey::new(question))
    }

    /// Select a candidate window
    pub fn select(speech_id: impl Into<String>, position: u64) -> Self {
        Self::SelectionChanged(SelectionKey::at(speech_id, position))
    }
}
