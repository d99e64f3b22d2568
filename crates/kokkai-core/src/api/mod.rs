//! Wire types for the speech search backend
//!
//! The backend exposes two server-push endpoints
//! (`/search_speeches_stream`, `/summarize_speech_stream`) whose events are
//! JSON documents of exactly two shapes: a progress marker or a terminal
//! result. The shape is discriminated once at decode time into
//! [`StreamPayload`]; nothing downstream re-checks it ad hoc.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Counts keyed by unit name, e.g. `{"tokens": 1200}`.
///
/// Units other than the known two are carried through untouched; the backend
/// is free to invent new ones.
pub type UnitCounts = HashMap<String, f64>;

/// Per-source usage record, split by direction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageEntry {
    /// Counts consumed by the request (prompt side)
    #[serde(default)]
    pub input: UnitCounts,
    /// Counts produced by the response (completion side)
    #[serde(default)]
    pub output: UnitCounts,
}

/// Usage keyed by source identifier (a model pass name such as `qac`,
/// `score`, `summarize` or `annotate`)
pub type UsageMap = HashMap<String, UsageEntry>;

/// Per-pass wall-clock timing reported alongside usage
pub type SecondsMap = HashMap<String, f64>;

/// The unit a model is billed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingUnit {
    #[serde(rename = "tokens")]
    Tokens,
    #[serde(rename = "not_whitespace_characters")]
    NotWhitespaceCharacters,
}

impl BillingUnit {
    /// The unit name as it appears as a usage-map key
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tokens => "tokens",
            Self::NotWhitespaceCharacters => "not_whitespace_characters",
        }
    }
}

/// Per-direction unit prices in USD
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitPrice {
    /// USD per billing unit on the input side
    pub input: f64,
    /// USD per billing unit on the output side
    pub output: f64,
}

/// Price schedule for the active model, if one is known
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    /// The unit prices are quoted in
    pub unit: BillingUnit,
    /// Price per unit, per direction
    pub unit_usd: UnitPrice,
}

/// Identity and pricing of the model that served a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatModelInfo {
    /// Model display name
    pub name: String,
    /// Price schedule; `None` means usage-only display
    pub price: Option<ModelPrice>,
}

/// One candidate speech from the National Diet records
///
/// Field names follow the NDL API (camelCase on the wire). Long speeches are
/// served as partial windows; `partial` identifies the window and `length`
/// the full source length. Unknown metadata fields are tolerated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speech {
    /// NDL speech identifier
    #[serde(rename = "speechID")]
    pub speech_id: String,
    /// Relevance score assigned by the scoring pass, 0-100
    pub score: f64,
    /// NDL meeting-record identifier
    #[serde(rename = "issueID")]
    pub issue_id: String,
    /// Position of the speech within its meeting record
    #[serde(rename = "speechOrder")]
    pub speech_order: i64,
    /// Meeting date
    pub date: NaiveDate,
    /// House name (衆議院 / 参議院)
    #[serde(rename = "nameOfHouse")]
    pub name_of_house: String,
    /// Committee or plenary session name
    #[serde(rename = "nameOfMeeting")]
    pub name_of_meeting: String,
    /// Speaker name
    pub speaker: String,
    /// Speaker's post, when recorded
    #[serde(rename = "speakerPosition", default)]
    pub speaker_position: Option<String>,
    /// The speech text (possibly a truncated window)
    pub speech: String,
    /// Search keywords that matched this speech
    #[serde(default)]
    pub queries: Vec<String>,
    /// `[offset, length]` of this window into the full source text
    #[serde(default)]
    pub partial: Option<(u64, u64)>,
    /// Full source text length, present when the speech was truncated
    #[serde(default)]
    pub length: Option<u64>,
    /// Remaining NDL metadata, carried through untouched
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Speech {
    /// Character offset of this window; 0 for unsplit speeches
    pub fn position(&self) -> u64 {
        self.partial.map(|(offset, _)| offset).unwrap_or(0)
    }

    /// Selection key identifying this candidate window
    pub fn selection_key(&self) -> crate::types::SelectionKey {
        crate::types::SelectionKey::at(self.speech_id.clone(), self.position())
    }

    /// Permalink into the NDL meeting-record viewer
    pub fn permalink(&self) -> String {
        format!(
            "https://kokkai.ndl.go.jp/#/detail?minId={}&spkNum={}",
            self.issue_id, self.speech_order
        )
    }
}

/// Terminal payload of the search stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpeechesResult {
    /// Model that served the request
    pub chat_model_info: ChatModelInfo,
    /// Search keywords proposed by the query-construction pass
    pub queries: Vec<String>,
    /// Ranked candidate list; may legitimately be empty
    pub speeches: Vec<Speech>,
    /// Usage per model pass
    pub usage: UsageMap,
    /// Timing per pass
    #[serde(default)]
    pub seconds: SecondsMap,
}

/// Terminal payload of the summarize stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizeSpeechResult {
    /// Model that served the request
    pub chat_model_info: ChatModelInfo,
    /// One-paragraph summary of the selected speech
    pub summary: String,
    /// The original speech text with summary-backed spans marked up
    pub annotated: String,
    /// Usage per model pass
    pub usage: UsageMap,
    /// Timing per pass
    #[serde(default)]
    pub seconds: SecondsMap,
}

/// Terminal results expose their usage and model info uniformly so the
/// pipeline can fold them without knowing which stage they came from
pub trait TerminalResult {
    /// Usage map reported with the result
    fn usage(&self) -> &UsageMap;
    /// Model identity and pricing
    fn model_info(&self) -> &ChatModelInfo;
}

impl TerminalResult for SearchSpeechesResult {
    fn usage(&self) -> &UsageMap {
        &self.usage
    }

    fn model_info(&self) -> &ChatModelInfo {
        &self.chat_model_info
    }
}

impl TerminalResult for SummarizeSpeechResult {
    fn usage(&self) -> &UsageMap {
        &self.usage
    }

    fn model_info(&self) -> &ChatModelInfo {
        &self.chat_model_info
    }
}

/// Progress marker emitted while a stream is still working
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Human-readable progress string
    pub progress: String,
}

/// One decoded stream event, discriminated at decode time.
///
/// A payload carrying a `progress` field is a progress marker; anything else
/// must decode as the stage's terminal result. Receiving a terminal payload
/// ends the stream from the consumer's point of view.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StreamPayload<T> {
    /// The stream is still working
    Progress(ProgressEvent),
    /// The full result; the last payload of the stream
    Terminal(T),
}

impl<T> StreamPayload<T> {
    /// Whether this payload ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }

    /// The progress string, when this is a progress marker
    pub fn progress(&self) -> Option<&str> {
        match self {
            Self::Progress(p) => Some(&p.progress),
            Self::Terminal(_) => None,
        }
    }

    /// The terminal result, when this payload carries one
    pub fn terminal(&self) -> Option<&T> {
        match self {
            Self::Progress(_) => None,
            Self::Terminal(t) => Some(t),
        }
    }
}
