//! Transport seam between the controller and the network
//!
//! The controller decides *when* a stage's stream opens or closes; this trait
//! is the *how*. The production implementation spawns real SSE sessions that
//! post their decoded payloads back onto the controller's event queue; tests
//! substitute a recording fake and inject payloads directly.

use crate::error::KokkaiResult;
use crate::config::Config;
use crate::pipeline::events::Event;
use crate::stream::{session, SessionHandle};
use crate::types::{QueryKey, SummarizeKey};
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

/// Opens one session per call; the returned handle is the only way to close
/// it again
pub trait StreamOpener {
    /// Open a search stream for `key`
    fn open_search(&mut self, key: &QueryKey, token: Option<&str>) -> SessionHandle;

    /// Open a summarize stream for `key`, carrying the literal text of the
    /// selected speech window (the backend needs the text, not the ids)
    fn open_summarize(
        &mut self,
        key: &SummarizeKey,
        speech_text: &str,
        token: Option<&str>,
    ) -> SessionHandle;
}

/// Production opener: real SSE sessions posting onto the event queue
pub struct HttpStreamOpener {
    client: reqwest::Client,
    search_url: Url,
    summarize_url: Url,
    timeout: Duration,
    events: mpsc::UnboundedSender<Event>,
}

impl HttpStreamOpener {
    /// Build an opener against the configured backend
    pub fn new(
        client: reqwest::Client,
        config: &Config,
        events: mpsc::UnboundedSender<Event>,
    ) -> KokkaiResult<Self> {
        let base = config.base_url()?;
        Ok(Self {
            client,
            search_url: base.join("search_speeches_stream")?,
            summarize_url: base.join("summarize_speech_stream")?,
            timeout: config.stream_timeout(),
            events,
        })
    }
}

impl StreamOpener for HttpStreamOpener {
    fn open_search(&mut self, key: &QueryKey, token: Option<&str>) -> SessionHandle {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair("question", &key.question);

        let events = self.events.clone();
        let end_events = self.events.clone();
        let key = key.clone();
        let end_key = key.clone();
        session::open(
            self.client.clone(),
            url,
            token.map(str::to_owned),
            self.timeout,
            move |payload| {
                // The receiver disappearing just means the engine shut down.
                let _ = events.send(Event::Search {
                    key: key.clone(),
                    payload,
                });
            },
            move |end| {
                let _ = end_events.send(Event::SearchEnded { key: end_key, end });
            },
        )
    }

    fn open_summarize(
        &mut self,
        key: &SummarizeKey,
        speech_text: &str,
        token: Option<&str>,
    ) -> SessionHandle {
        let mut url = self.summarize_url.clone();
        url.query_pairs_mut()
            .append_pair("question", &key.query.question)
            .append_pair("speech", speech_text);

        let events = self.events.clone();
        let end_events = self.events.clone();
        let key = key.clone();
        let end_key = key.clone();
        session::open(
            self.client.clone(),
            url,
            token.map(str::to_owned),
            self.timeout,
            move |payload| {
                let _ = events.send(Event::Summarize {
                    key: key.clone(),
                    payload,
                });
            },
            move |end| {
                let _ = end_events.send(Event::SummarizeEnded { key: end_key, end });
            },
        )
    }
}
