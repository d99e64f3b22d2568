//! Stream session manager
//!
//! One session owns exactly one server-push stream for one logical request:
//! it opens the connection (attaching the bearer token when one is known),
//! enforces a hard wall-clock timeout, decodes each event exactly once, and
//! reaches exactly one terminal disposition. Every failure mode is silent
//! abandonment: the owner's stage simply stops updating, and recovery only
//! ever happens through a fresh user action opening a fresh session.

use crate::stream::sse::SseDecoder;
use crate::api::StreamPayload;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Lifecycle of one stream session.
///
/// `Completed` and `Abandoned` are terminal; no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created but not yet spawned
    Idle,
    /// Request sent, response headers not yet received
    Connecting,
    /// Receiving events
    Streaming,
    /// Terminal payload received
    Completed,
    /// Timed out, transport failed, or superseded by the owner
    Abandoned,
}

impl SessionState {
    /// Whether this state can never be left
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Terminal payload received and delivered
    Completed,
    /// Wall-clock budget exhausted
    TimedOut,
    /// Connection failed, dropped, or delivered an undecodable payload
    TransportFailed,
    /// Closed by the owner before finishing
    Superseded,
}

impl SessionEnd {
    fn state(&self) -> SessionState {
        match self {
            Self::Completed => SessionState::Completed,
            _ => SessionState::Abandoned,
        }
    }
}

/// Owner-side handle to a running session.
///
/// Dropping the handle closes the session, so a superseded stage cannot leak
/// its transport.
#[derive(Debug)]
pub struct SessionHandle {
    id: Uuid,
    cancel: CancellationToken,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Session id, for log correlation
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Close the session. Idempotent; the transport is released as soon as
    /// the session task observes the cancellation.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Whether `close` has been called (or the handle dropped elsewhere)
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Handle not backed by any task, for exercising the controller without
    /// a transport. The returned token observes `close` calls on the handle.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, CancellationToken) {
        let (_tx, rx) = watch::channel(SessionState::Idle);
        let cancel = CancellationToken::new();
        let handle = Self {
            id: Uuid::new_v4(),
            cancel: cancel.clone(),
            state: rx,
        };
        (handle, cancel)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Open a stream session against `url`.
///
/// Spawns the session task and returns immediately. Each decoded payload is
/// handed to `on_event` in transport order; `on_end` fires exactly once with
/// the terminal disposition. A terminal-shaped payload ends the session even
/// if the transport stays open.
pub fn open<T, F, G>(
    client: reqwest::Client,
    url: url::Url,
    auth_token: Option<String>,
    timeout: Duration,
    mut on_event: F,
    on_end: G,
) -> SessionHandle
where
    T: DeserializeOwned + Send + 'static,
    F: FnMut(StreamPayload<T>) + Send + 'static,
    G: FnOnce(SessionEnd) + Send + 'static,
{
    let id = Uuid::new_v4();
    let cancel = CancellationToken::new();
    let (state_tx, state_rx) = watch::channel(SessionState::Idle);

    let task_cancel = cancel.clone();
    tokio::spawn(async move {
        advance(&state_tx, SessionState::Connecting);
        let end = tokio::select! {
            _ = task_cancel.cancelled() => SessionEnd::Superseded,
            _ = tokio::time::sleep(timeout) => SessionEnd::TimedOut,
            end = run_stream(&client, url, auth_token, &state_tx, &mut on_event) => end,
        };
        advance(&state_tx, end.state());
        match end {
            SessionEnd::Completed => tracing::debug!(session = %id, "stream completed"),
            SessionEnd::TimedOut => tracing::warn!(session = %id, "stream abandoned: timeout"),
            SessionEnd::TransportFailed => {
                tracing::warn!(session = %id, "stream abandoned: transport error")
            }
            SessionEnd::Superseded => tracing::debug!(session = %id, "stream superseded"),
        }
        on_end(end);
    });

    SessionHandle {
        id,
        cancel,
        state: state_rx,
    }
}

/// Advance the lifecycle state; terminal states are never left
fn advance(state: &watch::Sender<SessionState>, to: SessionState) {
    state.send_if_modified(|current| {
        if current.is_terminal() || *current == to {
            false
        } else {
            *current = to;
            true
        }
    });
}

async fn run_stream<T, F>(
    client: &reqwest::Client,
    url: url::Url,
    auth_token: Option<String>,
    state: &watch::Sender<SessionState>,
    on_event: &mut F,
) -> SessionEnd
where
    T: DeserializeOwned,
    F: FnMut(StreamPayload<T>),
{
    let mut request = client.get(url);
    if let Some(token) = auth_token {
        request = request.bearer_auth(token);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(error = %e, "stream connect failed");
            return SessionEnd::TransportFailed;
        }
    };
    if !response.status().is_success() {
        tracing::debug!(status = %response.status(), "stream rejected");
        return SessionEnd::TransportFailed;
    }

    advance(state, SessionState::Streaming);

    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(error = %e, "stream read failed");
                return SessionEnd::TransportFailed;
            }
        };
        for data in decoder.feed(&chunk) {
            let payload: StreamPayload<T> = match serde_json::from_str(&data) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::debug!(error = %e, "undecodable stream payload");
                    return SessionEnd::TransportFailed;
                }
            };
            let terminal = payload.is_terminal();
            on_event(payload);
            if terminal {
                // The consumer is done with this stream even if the server
                // keeps the transport open.
                return SessionEnd::Completed;
            }
        }
    }

    // Transport closed without a terminal payload.
    SessionEnd::TransportFailed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ProgressEvent, SummarizeSpeechResult};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type Collected = Arc<Mutex<Vec<StreamPayload<SummarizeSpeechResult>>>>;

    fn sse_body(events: &[&str]) -> String {
        events
            .iter()
            .map(|e| format!("data:{e}\n\n"))
            .collect::<String>()
    }

    fn summarize_terminal() -> &'static str {
        r#"{"chat_model_info":{"name":"m","price":null},"summary":"要約です。","annotated":"本文","usage":{"summarize":{"input":{"tokens":10},"output":{"tokens":5}}}}"#
    }

    async fn open_collecting(
        server: &MockServer,
        token: Option<&str>,
        timeout: Duration,
    ) -> (SessionHandle, Collected, mpsc::UnboundedReceiver<SessionEnd>) {
        let url = url::Url::parse(&format!("{}/summarize_speech_stream?question=q&speech=s", server.uri())).unwrap();
        let events: Collected = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let (end_tx, end_rx) = mpsc::unbounded_channel();
        let handle = open(
            reqwest::Client::new(),
            url,
            token.map(str::to_owned),
            timeout,
            move |payload| sink.lock().unwrap().push(payload),
            move |end| {
                let _ = end_tx.send(end);
            },
        );
        (handle, events, end_rx)
    }

    #[tokio::test]
    async fn completes_on_terminal_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/summarize_speech_stream"))
            .and(query_param("question", "q"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                sse_body(&[r#"{"progress":"summarizing"}"#, summarize_terminal()]),
                "text/event-stream",
            ))
            .mount(&server)
            .await;

        let (handle, events, mut end_rx) =
            open_collecting(&server, None, Duration::from_secs(5)).await;
        let end = end_rx.recv().await.unwrap();

        assert_eq!(end, SessionEnd::Completed);
        assert_eq!(handle.state(), SessionState::Completed);
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].progress(), Some("summarizing"));
        assert_eq!(events[1].terminal().unwrap().summary, "要約です。");
    }

    #[tokio::test]
    async fn bearer_header_attached_when_token_known() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/summarize_speech_stream"))
            .and(header("authorization", "Bearer id-token"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                sse_body(&[summarize_terminal()]),
                "text/event-stream",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let (_handle, _events, mut end_rx) =
            open_collecting(&server, Some("id-token"), Duration::from_secs(5)).await;
        assert_eq!(end_rx.recv().await.unwrap(), SessionEnd::Completed);
    }

    #[tokio::test]
    async fn rejected_request_is_silent_abandonment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (handle, events, mut end_rx) =
            open_collecting(&server, None, Duration::from_secs(5)).await;
        assert_eq!(end_rx.recv().await.unwrap(), SessionEnd::TransportFailed);
        assert_eq!(handle.state(), SessionState::Abandoned);
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stream_without_terminal_is_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                sse_body(&[r#"{"progress":"summarizing"}"#]),
                "text/event-stream",
            ))
            .mount(&server)
            .await;

        let (_handle, events, mut end_rx) =
            open_collecting(&server, None, Duration::from_secs(5)).await;
        assert_eq!(end_rx.recv().await.unwrap(), SessionEnd::TransportFailed);
        // The progress event was still delivered before the drop.
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn timeout_forces_abandonment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(30))
                    .set_body_raw(sse_body(&[summarize_terminal()]), "text/event-stream"),
            )
            .mount(&server)
            .await;

        let (handle, events, mut end_rx) =
            open_collecting(&server, None, Duration::from_millis(50)).await;
        assert_eq!(end_rx.recv().await.unwrap(), SessionEnd::TimedOut);
        assert_eq!(handle.state(), SessionState::Abandoned);
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn close_supersedes_and_is_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(30))
                    .set_body_raw(sse_body(&[summarize_terminal()]), "text/event-stream"),
            )
            .mount(&server)
            .await;

        let (handle, _events, mut end_rx) =
            open_collecting(&server, None, Duration::from_secs(60)).await;
        handle.close();
        handle.close();
        assert!(handle.is_closed());
        assert_eq!(end_rx.recv().await.unwrap(), SessionEnd::Superseded);
        assert_eq!(handle.state(), SessionState::Abandoned);
    }

    #[test]
    fn terminal_states_are_never_left() {
        let (tx, rx) = watch::channel(SessionState::Idle);
        advance(&tx, SessionState::Connecting);
        advance(&tx, SessionState::Streaming);
        advance(&tx, SessionState::Completed);
        advance(&tx, SessionState::Abandoned);
        assert_eq!(*rx.borrow(), SessionState::Completed);

        let (tx, rx) = watch::channel(SessionState::Abandoned);
        advance(&tx, SessionState::Streaming);
        assert_eq!(*rx.borrow(), SessionState::Abandoned);
    }

    #[test]
    fn progress_then_terminal_decode_shapes() {
        let progress: StreamPayload<SummarizeSpeechResult> =
            serde_json::from_str(r#"{"progress":"annotating"}"#).unwrap();
        assert_eq!(
            progress,
            StreamPayload::Progress(ProgressEvent {
                progress: "annotating".to_string()
            })
        );
        let terminal: StreamPayload<SummarizeSpeechResult> =
            serde_json::from_str(summarize_terminal()).unwrap();
        assert!(terminal.is_terminal());
    }
}
