//! Controller transition tests over a recording fake opener

use crate::api::{
    BillingUnit, ChatModelInfo, ModelPrice, ProgressEvent, SearchSpeechesResult, Speech,
    StreamPayload, SummarizeSpeechResult, UnitPrice, UsageMap,
};
use crate::auth::AuthState;
use crate::pipeline::controller::Controller;
use crate::pipeline::events::Event;
use crate::pipeline::opener::StreamOpener;
use crate::stream::{SessionEnd, SessionHandle};
use crate::types::{QueryKey, SelectionKey, SummarizeKey};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
enum Opened {
    Search {
        question: String,
        token: Option<String>,
    },
    Summarize {
        question: String,
        selection: SelectionKey,
        speech: String,
        token: Option<String>,
    },
}

/// Records every open and the cancellation token of each returned handle
#[derive(Clone, Default)]
struct FakeOpener {
    opened: Arc<Mutex<Vec<Opened>>>,
    cancels: Arc<Mutex<Vec<CancellationToken>>>,
}

impl FakeOpener {
    fn opened(&self) -> Vec<Opened> {
        self.opened.lock().unwrap().clone()
    }

    fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    fn cancel_token(&self, index: usize) -> CancellationToken {
        self.cancels.lock().unwrap()[index].clone()
    }

    fn record(&self, call: Opened) -> SessionHandle {
        let (handle, cancel) = SessionHandle::detached();
        self.opened.lock().unwrap().push(call);
        self.cancels.lock().unwrap().push(cancel);
        handle
    }
}

impl StreamOpener for FakeOpener {
    fn open_search(&mut self, key: &QueryKey, token: Option<&str>) -> SessionHandle {
        self.record(Opened::Search {
            question: key.question.clone(),
            token: token.map(str::to_owned),
        })
    }

    fn open_summarize(
        &mut self,
        key: &SummarizeKey,
        speech_text: &str,
        token: Option<&str>,
    ) -> SessionHandle {
        self.record(Opened::Summarize {
            question: key.query.question.clone(),
            selection: key.selection.clone(),
            speech: speech_text.to_owned(),
            token: token.map(str::to_owned),
        })
    }
}

fn model_info() -> ChatModelInfo {
    ChatModelInfo {
        name: "gpt-4o-mini".to_string(),
        price: Some(ModelPrice {
            unit: BillingUnit::Tokens,
            unit_usd: UnitPrice {
                input: 0.000001,
                output: 0.000003,
            },
        }),
    }
}

fn speech(speech_id: &str, partial: Option<(u64, u64)>, text: &str) -> Speech {
    Speech {
        speech_id: speech_id.to_string(),
        score: 85.0,
        issue_id: "121714024X00919890607".to_string(),
        speech_order: 9,
        date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        name_of_house: "衆議院".to_string(),
        name_of_meeting: "財務金融委員会".to_string(),
        speaker: "衆議院議員".to_string(),
        speaker_position: None,
        speech: text.to_string(),
        queries: vec!["消費税".to_string()],
        partial,
        length: partial.map(|(_, len)| len * 2),
        extra: HashMap::new(),
    }
}

fn usage(input_tokens: f64, output_tokens: f64) -> UsageMap {
    let entry = crate::api::UsageEntry {
        input: [("tokens".to_string(), input_tokens)].into_iter().collect(),
        output: [("tokens".to_string(), output_tokens)].into_iter().collect(),
    };
    [("main".to_string(), entry)].into_iter().collect()
}

fn search_result(speeches: Vec<Speech>) -> SearchSpeechesResult {
    SearchSpeechesResult {
        chat_model_info: model_info(),
        queries: vec!["消費税".to_string(), "税率".to_string()],
        speeches,
        usage: usage(120.0, 40.0),
        seconds: Default::default(),
    }
}

fn summarize_result() -> SummarizeSpeechResult {
    SummarizeSpeechResult {
        chat_model_info: model_info(),
        summary: "要約".to_string(),
        annotated: "本文".to_string(),
        usage: usage(500.0, 80.0),
        seconds: Default::default(),
    }
}

fn search_terminal(question: &str, speeches: Vec<Speech>) -> Event {
    Event::Search {
        key: QueryKey::new(question),
        payload: StreamPayload::Terminal(search_result(speeches)),
    }
}

fn summarize_terminal(question: &str, selection: SelectionKey) -> Event {
    Event::Summarize {
        key: SummarizeKey::new(QueryKey::new(question), selection),
        payload: StreamPayload::Terminal(summarize_result()),
    }
}

/// Controller with anonymous auth already resolved
fn ready_controller() -> (Controller<FakeOpener>, FakeOpener) {
    let opener = FakeOpener::default();
    let mut controller = Controller::new(opener.clone());
    controller.handle(Event::AuthChanged(AuthState::Anonymous));
    (controller, opener)
}

#[test]
fn question_opens_search_and_terminal_auto_selects() {
    let (mut controller, opener) = ready_controller();

    controller.handle(Event::question("消費税について"));
    assert_eq!(
        opener.opened(),
        vec![Opened::Search {
            question: "消費税について".to_string(),
            token: None,
        }]
    );

    controller.handle(Event::Search {
        key: QueryKey::new("消費税について"),
        payload: StreamPayload::Progress(ProgressEvent {
            progress: "検索語を生成中".to_string(),
        }),
    });
    let display = controller.display();
    assert_eq!(display.search.progress.as_deref(), Some("検索語を生成中"));
    assert!(!display.search.complete);

    controller.handle(search_terminal(
        "消費税について",
        vec![
            speech("s1", None, "税率の引き上げについて申し上げます。"),
            speech("s2", None, "別の発言です。"),
        ],
    ));

    // Top candidate auto-selected; its literal text flows into the summarize
    // request.
    assert_eq!(controller.selection(), Some(&SelectionKey::new("s1")));
    assert_eq!(
        opener.opened()[1],
        Opened::Summarize {
            question: "消費税について".to_string(),
            selection: SelectionKey::new("s1"),
            speech: "税率の引き上げについて申し上げます。".to_string(),
            token: None,
        }
    );

    controller.handle(summarize_terminal("消費税について", SelectionKey::new("s1")));
    let display = controller.display();
    assert!(display.search.complete);
    assert!(display.summarize.complete);
    assert_eq!(
        display.summarize.result.as_ref().map(|r| r.summary.as_str()),
        Some("要約")
    );
    // 500 in + 80 out at 1e-6 / 3e-6 per token.
    let cost = display.summarize.cost.unwrap();
    assert!((cost.total_usd - 0.00074).abs() < 1e-12);
}

#[test]
fn new_question_supersedes_search_and_discards_stale_terminal() {
    let (mut controller, opener) = ready_controller();

    controller.handle(Event::question("質問A"));
    controller.handle(Event::question("質問B"));

    assert!(opener.cancel_token(0).is_cancelled());
    assert_eq!(opener.open_count(), 2);
    assert_eq!(
        opener.opened()[1],
        Opened::Search {
            question: "質問B".to_string(),
            token: None,
        }
    );

    // Late terminal from the superseded session: discarded on arrival.
    controller.handle(search_terminal("質問A", vec![speech("s1", None, "古い結果")]));
    let display = controller.display();
    assert!(display.search.result.is_none());
    assert!(display.selection.is_none());
    assert_eq!(opener.open_count(), 2);
}

#[test]
fn selection_change_supersedes_summarize() {
    let (mut controller, opener) = ready_controller();
    controller.handle(Event::question("q"));
    controller.handle(search_terminal(
        "q",
        vec![speech("s1", None, "発言一"), speech("s2", None, "発言二")],
    ));
    assert_eq!(opener.open_count(), 2);

    controller.handle(Event::select("s2", 0));
    assert!(opener.cancel_token(1).is_cancelled());
    assert_eq!(
        opener.opened()[2],
        Opened::Summarize {
            question: "q".to_string(),
            selection: SelectionKey::new("s2"),
            speech: "発言二".to_string(),
            token: None,
        }
    );

    // The superseded summarize stream's terminal arrives late: discarded.
    controller.handle(summarize_terminal("q", SelectionKey::new("s1")));
    let display = controller.display();
    assert!(display.summarize.result.is_none());
    assert!(!display.summarize.complete);

    controller.handle(summarize_terminal("q", SelectionKey::new("s2")));
    assert!(controller.display().summarize.complete);
}

#[test]
fn resubmitting_the_same_question_changes_nothing() {
    let (mut controller, opener) = ready_controller();
    controller.handle(Event::question("q"));
    controller.handle(search_terminal("q", vec![speech("s1", None, "発言")]));
    controller.handle(Event::SearchEnded {
        key: QueryKey::new("q"),
        end: SessionEnd::Completed,
    });
    controller.handle(summarize_terminal("q", SelectionKey::new("s1")));
    controller.handle(Event::SummarizeEnded {
        key: SummarizeKey::new(QueryKey::new("q"), SelectionKey::new("s1")),
        end: SessionEnd::Completed,
    });
    let opens_before = opener.open_count();

    controller.handle(Event::question("q"));

    assert_eq!(opener.open_count(), opens_before);
    assert_eq!(controller.selection(), Some(&SelectionKey::new("s1")));
    assert!(controller.display().summarize.complete);
}

#[test]
fn reselecting_the_same_candidate_changes_nothing() {
    let (mut controller, opener) = ready_controller();
    controller.handle(Event::question("q"));
    controller.handle(search_terminal("q", vec![speech("s1", None, "発言")]));
    let opens_before = opener.open_count();

    controller.handle(Event::select("s1", 0));

    assert_eq!(opener.open_count(), opens_before);
    assert!(!opener.cancel_token(1).is_cancelled());
}

#[test]
fn intents_are_deferred_until_auth_resolves() {
    let opener = FakeOpener::default();
    let mut controller = Controller::new(opener.clone());

    controller.handle(Event::question("q"));
    assert_eq!(opener.open_count(), 0);
    assert!(controller.display().auth_pending);

    controller.handle(Event::AuthChanged(AuthState::AwaitingSignIn));
    assert_eq!(opener.open_count(), 0);
    assert!(controller.display().sign_in_required);

    controller.handle(Event::AuthChanged(AuthState::SignedIn("id-token".to_string())));
    assert_eq!(
        opener.opened(),
        vec![Opened::Search {
            question: "q".to_string(),
            token: Some("id-token".to_string()),
        }]
    );
    assert!(!controller.display().sign_in_required);
}

#[test]
fn unsupported_auth_never_opens_streams() {
    let opener = FakeOpener::default();
    let mut controller = Controller::new(opener.clone());
    controller.handle(Event::AuthChanged(AuthState::Unsupported));

    controller.handle(Event::question("q"));
    controller.handle(Event::question("別の質問"));

    assert_eq!(opener.open_count(), 0);
}

#[test]
fn empty_candidate_list_completes_without_selection() {
    let (mut controller, opener) = ready_controller();
    controller.handle(Event::question("q"));
    controller.handle(search_terminal("q", vec![]));

    let display = controller.display();
    assert!(display.search.complete);
    assert!(display.selection.is_none());
    assert!(display.summarize.result.is_none());
    // No summarize stream was ever opened.
    assert_eq!(opener.open_count(), 1);
}

#[test]
fn window_only_selection_change_is_a_new_request() {
    let (mut controller, opener) = ready_controller();
    controller.handle(Event::question("q"));
    controller.handle(search_terminal(
        "q",
        vec![
            speech("s1", Some((0, 2000)), "前半の窓"),
            speech("s1", Some((2000, 2000)), "後半の窓"),
        ],
    ));
    assert_eq!(controller.selection(), Some(&SelectionKey::at("s1", 0)));

    controller.handle(Event::select("s1", 2000));

    assert!(opener.cancel_token(1).is_cancelled());
    assert_eq!(
        opener.opened()[2],
        Opened::Summarize {
            question: "q".to_string(),
            selection: SelectionKey::at("s1", 2000),
            speech: "後半の窓".to_string(),
            token: None,
        }
    );
}

#[test]
fn manual_selection_before_terminal_waits_for_the_candidate_list() {
    let (mut controller, opener) = ready_controller();
    controller.handle(Event::question("q"));

    // The user somehow picks a candidate before any list exists; nothing to
    // summarize yet.
    controller.handle(Event::select("s2", 0));
    assert_eq!(opener.open_count(), 1);

    controller.handle(search_terminal(
        "q",
        vec![speech("s1", None, "発言一"), speech("s2", None, "発言二")],
    ));

    // The explicit selection wins over auto-selection and resolves once the
    // list arrives.
    assert_eq!(controller.selection(), Some(&SelectionKey::new("s2")));
    assert_eq!(
        opener.opened()[1],
        Opened::Summarize {
            question: "q".to_string(),
            selection: SelectionKey::new("s2"),
            speech: "発言二".to_string(),
            token: None,
        }
    );
}

#[test]
fn resubmitting_after_a_failed_search_opens_a_fresh_stream() {
    let (mut controller, opener) = ready_controller();
    controller.handle(Event::question("q"));
    assert_eq!(opener.open_count(), 1);

    controller.handle(Event::SearchEnded {
        key: QueryKey::new("q"),
        end: SessionEnd::TransportFailed,
    });
    // Abandonment is silent and never retried on its own.
    assert_eq!(opener.open_count(), 1);
    assert!(!controller.display().search.complete);

    controller.handle(Event::question("q"));
    assert_eq!(opener.open_count(), 2);
    assert_eq!(
        opener.opened()[1],
        Opened::Search {
            question: "q".to_string(),
            token: None,
        }
    );
}

#[test]
fn reselecting_after_a_failed_summarize_opens_a_fresh_stream() {
    let (mut controller, opener) = ready_controller();
    controller.handle(Event::question("q"));
    controller.handle(search_terminal("q", vec![speech("s1", None, "発言")]));
    assert_eq!(opener.open_count(), 2);

    controller.handle(Event::SummarizeEnded {
        key: SummarizeKey::new(QueryKey::new("q"), SelectionKey::new("s1")),
        end: SessionEnd::TimedOut,
    });
    assert_eq!(opener.open_count(), 2);

    controller.handle(Event::select("s1", 0));
    assert_eq!(opener.open_count(), 3);
    assert_eq!(
        opener.opened()[2],
        Opened::Summarize {
            question: "q".to_string(),
            selection: SelectionKey::new("s1"),
            speech: "発言".to_string(),
            token: None,
        }
    );
}

#[test]
fn end_disposition_for_a_superseded_key_is_ignored() {
    let (mut controller, opener) = ready_controller();
    controller.handle(Event::question("質問A"));
    controller.handle(Event::question("質問B"));
    assert_eq!(opener.open_count(), 2);

    // The superseded session reports its close after the replacement opened.
    controller.handle(Event::SearchEnded {
        key: QueryKey::new("質問A"),
        end: SessionEnd::Superseded,
    });

    // B's stage is untouched: resubmitting B is still a no-op.
    controller.handle(Event::question("質問B"));
    assert_eq!(opener.open_count(), 2);
}

#[test]
fn completed_disposition_does_not_mark_abandonment() {
    let (mut controller, opener) = ready_controller();
    controller.handle(Event::question("q"));
    controller.handle(search_terminal("q", vec![speech("s1", None, "発言")]));
    controller.handle(Event::SearchEnded {
        key: QueryKey::new("q"),
        end: SessionEnd::Completed,
    });

    assert!(!controller.search_stage().abandoned());
    let opens_before = opener.open_count();
    controller.handle(Event::question("q"));
    assert_eq!(opener.open_count(), opens_before);
}

#[test]
fn shutdown_closes_both_stages() {
    let (mut controller, opener) = ready_controller();
    controller.handle(Event::question("q"));
    controller.handle(search_terminal("q", vec![speech("s1", None, "発言")]));
    assert_eq!(opener.open_count(), 2);

    controller.handle(Event::Shutdown);

    assert!(opener.cancel_token(1).is_cancelled());
    let display = controller.display();
    assert!(display.question.is_none());
    assert!(display.selection.is_none());
    assert_eq!(opener.open_count(), 2);
    assert!(controller.search_stage().request_key().is_none());
    assert!(controller.summarize_stage().request_key().is_none());
}
