//! Request key types shared across the pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one search request.
///
/// Two keys are equal iff their question strings are equal; the controller
/// uses that equality to decide whether an in-flight search stream still
/// answers the current question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey {
    /// The user's natural-language question
    pub question: String,
}

impl QueryKey {
    /// Create a new query key
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.question)
    }
}

/// Identifies the active candidate speech.
///
/// Long speeches are truncated by the server into partial windows; `position`
/// is the character offset of the window start and is 0 for unsplit speeches.
/// Selection equality compares both fields, so changing only the window
/// counts as a new selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionKey {
    /// NDL speech identifier
    pub speech_id: String,
    /// Character offset of the selected window into the full source text
    pub position: u64,
}

impl SelectionKey {
    /// Create a selection key for an unsplit speech
    pub fn new(speech_id: impl Into<String>) -> Self {
        Self {
            speech_id: speech_id.into(),
            position: 0,
        }
    }

    /// Create a selection key for a specific window of a split speech
    pub fn at(speech_id: impl Into<String>, position: u64) -> Self {
        Self {
            speech_id: speech_id.into(),
            position,
        }
    }
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.speech_id, self.position)
    }
}

/// Composite request key for the summarize stage.
///
/// A summary is only valid for the exact pair of question and selected
/// window; a mismatch on any component makes an in-flight or completed
/// summarize stream stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SummarizeKey {
    /// The question the summary answers
    pub query: QueryKey,
    /// The speech window being summarized
    pub selection: SelectionKey,
}

impl SummarizeKey {
    /// Create a new summarize key
    pub fn new(query: QueryKey, selection: SelectionKey) -> Self {
        Self { query, selection }
    }
}

impl fmt::Display for SummarizeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.query, self.selection)
    }
}
