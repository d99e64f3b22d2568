//! Query pipeline controller
//!
//! The single authority reconciling user intent with the two dependent
//! stream stages. All shared state lives here and is mutated only from
//! [`Controller::handle`], which runs to completion per event; the sessions
//! themselves never touch it. Staleness is decided by request-key equality
//! on every delivery, so the transition rules hold under any interleaving of
//! the two streams, including payloads racing a close.

use crate::api::{SearchSpeechesResult, SummarizeSpeechResult, TerminalResult};
use crate::auth::AuthState;
use crate::pipeline::display::{DisplayState, StageView};
use crate::pipeline::events::Event;
use crate::pipeline::opener::StreamOpener;
use crate::pipeline::stage::Stage;
use crate::types::{QueryKey, SelectionKey, SummarizeKey};

/// Event-driven reducer over the engine's whole state
pub struct Controller<O: StreamOpener> {
    opener: O,
    auth: AuthState,
    question: Option<QueryKey>,
    selection: Option<SelectionKey>,
    search: Stage<QueryKey, SearchSpeechesResult>,
    summarize: Stage<SummarizeKey, SummarizeSpeechResult>,
    auth_fault_reported: bool,
}

impl<O: StreamOpener> Controller<O> {
    /// Create a controller; auth starts unresolved, so nothing can stream
    /// until an [`Event::AuthChanged`] arrives
    pub fn new(opener: O) -> Self {
        Self {
            opener,
            auth: AuthState::Unknown,
            question: None,
            selection: None,
            search: Stage::new(),
            summarize: Stage::new(),
            auth_fault_reported: false,
        }
    }

    /// Apply one event and run the transition rules to completion
    pub fn handle(&mut self, event: Event) {
        match event {
            Event::QuestionSubmitted(key) => {
                if self.question.as_ref() == Some(&key)
                    && self.search.answers(&key)
                    && !self.search.abandoned()
                {
                    // Resubmitting the same question with a stream already
                    // completed or in flight changes nothing. An abandoned
                    // stream does not count: resubmission is the recovery
                    // path and opens a fresh one.
                    tracing::debug!(question = %key, "question unchanged, keeping state");
                    return;
                }
                self.question = Some(key);
                self.selection = None;
                self.search.discard();
                self.summarize.discard();
            }
            Event::SelectionChanged(key) => {
                if self.selection.as_ref() == Some(&key) && !self.summarize.abandoned() {
                    return;
                }
                self.selection = Some(key);
                self.summarize.discard();
            }
            Event::AuthChanged(state) => {
                if !matches!(state, AuthState::Unsupported) {
                    self.auth_fault_reported = false;
                }
                self.auth = state;
            }
            Event::Search { key, payload } => {
                if !self.search.apply(&key, payload) {
                    tracing::debug!(question = %key, "discarding stale search payload");
                    return;
                }
            }
            Event::Summarize { key, payload } => {
                if !self.summarize.apply(&key, payload) {
                    tracing::debug!(key = %key, "discarding stale summarize payload");
                    return;
                }
            }
            Event::SearchEnded { key, end } => {
                // Abandonment is not retried; reconciling here would reopen
                // the stream without a user action.
                self.search.mark_ended(&key, end);
                return;
            }
            Event::SummarizeEnded { key, end } => {
                self.summarize.mark_ended(&key, end);
                return;
            }
            Event::Shutdown => {
                self.search.discard();
                self.summarize.discard();
                self.question = None;
                self.selection = None;
                return;
            }
        }
        self.reconcile();
    }

    /// Re-derive both stages from the current desired keys, opening and
    /// closing sessions as needed
    fn reconcile(&mut self) {
        if !self.auth.allows_streams() {
            if matches!(self.auth, AuthState::Unsupported) && !self.auth_fault_reported {
                // Feature-fatal: reported once, no stream can ever open.
                tracing::error!("unsupported auth configuration, streaming disabled");
                self.auth_fault_reported = true;
            }
            // Unknown or awaiting sign-in: intents stay pending and are
            // re-evaluated on the next auth event.
            return;
        }
        let token = self.auth.bearer().map(str::to_owned);

        if let Some(question) = self.question.clone() {
            if !self.search.answers(&question) {
                tracing::debug!(question = %question, "opening search stream");
                let session = self.opener.open_search(&question, token.as_deref());
                self.search.restart(question, session);
            }
        }

        self.auto_select();

        let desired = match (self.question.clone(), self.selection.clone()) {
            (Some(query), Some(selection)) => Some(SummarizeKey::new(query, selection)),
            _ => None,
        };
        match desired {
            Some(desired) if !self.summarize.answers(&desired) => {
                match self.resolve_selected_speech(&desired) {
                    Some(text) => {
                        tracing::debug!(key = %desired, "opening summarize stream");
                        let session =
                            self.opener
                                .open_summarize(&desired, &text, token.as_deref());
                        self.summarize.restart(desired, session);
                    }
                    None => {
                        // The selected candidate is not resolvable from the
                        // current search results; stay idle until a future
                        // search update resolves it.
                        if self.summarize.request_key().is_some() {
                            self.summarize.discard();
                        }
                    }
                }
            }
            None if self.summarize.request_key().is_some() => self.summarize.discard(),
            _ => {}
        }
    }

    /// Auto-select the top candidate the first time a non-empty list arrives
    /// while no selection is set
    fn auto_select(&mut self) {
        if self.selection.is_some() {
            return;
        }
        let Some(question) = &self.question else {
            return;
        };
        if !self.search.answers(question) {
            return;
        }
        if let Some(first) = self
            .search
            .latest_terminal()
            .and_then(|result| result.speeches.first())
        {
            let key = first.selection_key();
            tracing::debug!(selection = %key, "auto-selecting top candidate");
            self.selection = Some(key);
        }
    }

    /// Look up the selected window's literal text in the search stage's
    /// latest candidate list; the summarize request carries the text itself
    fn resolve_selected_speech(&self, desired: &SummarizeKey) -> Option<String> {
        if !self.search.answers(&desired.query) {
            return None;
        }
        self.search
            .latest_terminal()?
            .speeches
            .iter()
            .find(|speech| speech.selection_key() == desired.selection)
            .map(|speech| speech.speech.clone())
    }

    /// Render the current state for the presentation layer
    pub fn display(&self) -> DisplayState {
        let summarize_key = match (&self.question, &self.selection) {
            (Some(query), Some(selection)) => {
                Some(SummarizeKey::new(query.clone(), selection.clone()))
            }
            _ => None,
        };
        DisplayState {
            question: self.question.as_ref().map(|key| key.question.clone()),
            selection: self.selection.clone(),
            sign_in_required: false,
            auth_pending: false,
            search: stage_view(&self.search, self.question.as_ref()),
            summarize: stage_view(&self.summarize, summarize_key.as_ref()),
        }
        .with_auth(&self.auth)
    }

    #[cfg(test)]
    pub(crate) fn search_stage(&self) -> &Stage<QueryKey, SearchSpeechesResult> {
        &self.search
    }

    #[cfg(test)]
    pub(crate) fn summarize_stage(&self) -> &Stage<SummarizeKey, SummarizeSpeechResult> {
        &self.summarize
    }

    #[cfg(test)]
    pub(crate) fn selection(&self) -> Option<&SelectionKey> {
        self.selection.as_ref()
    }
}

fn stage_view<K, T>(stage: &Stage<K, T>, desired: Option<&K>) -> StageView<T>
where
    K: Clone + PartialEq,
    T: TerminalResult + Clone,
{
    StageView {
        progress: stage.progress().map(str::to_owned),
        result: match stage.latest_terminal() {
            // Only results for the currently desired key are displayable;
            // anything else is stale and reads as "not yet answering".
            Some(result) if desired.map(|key| stage.completed_for(key)).unwrap_or(false) => {
                Some(result.clone())
            }
            _ => None,
        },
        complete: desired.map(|key| stage.completed_for(key)).unwrap_or(false),
        usage: stage.usage().clone(),
        cost: stage.cost(),
        model: stage.model_name().map(str::to_owned),
    }
}
