//! Per-stage reconciled state
//!
//! A stage holds everything known about one streaming request/response cycle:
//! the key that produced it, the most recent decoded payload, whether the
//! terminal payload has arrived for that exact key, the usage folded so far,
//! and the handle of the live session. The invariant is at most one live
//! session per stage; replacing the request key always closes the previous
//! session first.

use crate::api::{StreamPayload, TerminalResult};
use crate::cost::{self, CostEstimate};
use crate::stream::{SessionEnd, SessionHandle};
use crate::usage::UsageTotals;

/// Reconciled state for one streaming stage
#[derive(Debug)]
pub struct Stage<K, T> {
    request_key: Option<K>,
    latest: Option<StreamPayload<T>>,
    completed_key: Option<K>,
    usage: UsageTotals,
    session: Option<SessionHandle>,
    abandoned: bool,
}

impl<K: Clone + PartialEq, T: TerminalResult> Stage<K, T> {
    /// Create an idle stage
    pub fn new() -> Self {
        Self {
            request_key: None,
            latest: None,
            completed_key: None,
            usage: UsageTotals::new(),
            session: None,
            abandoned: false,
        }
    }

    /// The key of the request this stage currently answers, if any
    pub fn request_key(&self) -> Option<&K> {
        self.request_key.as_ref()
    }

    /// Whether the terminal payload has arrived for exactly `key`
    pub fn completed_for(&self, key: &K) -> bool {
        self.completed_key.as_ref() == Some(key)
    }

    /// Whether this stage's state belongs to `key`, live or not. An
    /// abandoned request still answers its key here, so nothing reopens a
    /// stream without a fresh user action.
    pub fn answers(&self, key: &K) -> bool {
        self.request_key.as_ref() == Some(key)
    }

    /// Whether the session for the current request ended without delivering
    /// its terminal payload
    pub fn abandoned(&self) -> bool {
        self.abandoned
    }

    /// Record a session's end disposition.
    ///
    /// A disposition for a superseded key is stale and ignored, as its close
    /// may have raced with the supersession. An end without a prior terminal
    /// payload marks the request abandoned: the last good state stays
    /// displayed, but resubmitting the same key opens a fresh stream.
    pub fn mark_ended(&mut self, key: &K, end: SessionEnd) {
        if self.request_key.as_ref() != Some(key) {
            return;
        }
        if end == SessionEnd::Completed || self.completed_for(key) {
            return;
        }
        self.abandoned = true;
        self.session = None;
    }

    /// Close any live session and reset all state for a new request
    pub fn restart(&mut self, key: K, session: SessionHandle) {
        self.discard();
        self.request_key = Some(key);
        self.session = Some(session);
    }

    /// Close any live session and return to idle
    pub fn discard(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
        }
        self.request_key = None;
        self.latest = None;
        self.completed_key = None;
        self.usage = UsageTotals::new();
        self.abandoned = false;
    }

    /// Apply one decoded payload tagged with its request key.
    ///
    /// Returns `false` when the key no longer matches the live request — the
    /// payload is stale and must be discarded, even if its session's close
    /// raced with delivery.
    pub fn apply(&mut self, key: &K, payload: StreamPayload<T>) -> bool {
        if self.request_key.as_ref() != Some(key) {
            return false;
        }
        if let StreamPayload::Terminal(result) = &payload {
            self.usage.fold(result.usage());
            self.completed_key = Some(key.clone());
            // The session ends itself on a terminal payload; drop the handle.
            if let Some(session) = self.session.take() {
                session.close();
            }
        }
        self.latest = Some(payload);
        true
    }

    /// The most recent terminal result, if one has arrived
    pub fn latest_terminal(&self) -> Option<&T> {
        self.latest.as_ref().and_then(StreamPayload::terminal)
    }

    /// The most recent progress string, when still streaming
    pub fn progress(&self) -> Option<&str> {
        self.latest.as_ref().and_then(StreamPayload::progress)
    }

    /// Usage folded for the current request only
    pub fn usage(&self) -> &UsageTotals {
        &self.usage
    }

    /// Cost estimate under the active model's price schedule, when known
    pub fn cost(&self) -> Option<CostEstimate> {
        let info = self.latest_terminal()?.model_info();
        cost::estimate(&self.usage, info.price.as_ref())
    }

    /// Name of the model that served the current request, once known
    pub fn model_name(&self) -> Option<&str> {
        self.latest_terminal().map(|t| t.model_info().name.as_str())
    }

    #[cfg(test)]
    pub(crate) fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }
}
