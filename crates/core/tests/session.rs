use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tubechat_core::{
    Answer, Author, Intent, MemoryStorage, ModelId, Phase, ProviderTimestamp, QueryClient,
    RequestError, Result, SessionDeps, SessionHandle, SessionSnapshot, StorageBridge, StorageKey,
    StorageMap, TranscriptClient, TranscriptLoad, TranscriptState, session, start_session,
};

const WAIT: Duration = Duration::from_secs(2);
const SETTLE: Duration = Duration::from_millis(50);

struct PendingTranscript {
    video_id: String,
    respond: oneshot::Sender<Result<TranscriptLoad>>,
    cancel: CancellationToken,
}

impl PendingTranscript {
    fn succeed(self, questions: &[&str]) {
        let _ = self.respond.send(Ok(TranscriptLoad {
            video_id: self.video_id,
            quick_questions: questions.iter().map(|q| q.to_string()).collect(),
        }));
    }

    fn fail(self, error: RequestError) {
        let _ = self.respond.send(Err(error));
    }
}

struct PendingQuery {
    text: String,
    model: ModelId,
    respond: oneshot::Sender<Result<Answer>>,
    cancel: CancellationToken,
}

impl PendingQuery {
    fn answer(self, text: &str, timestamps: Option<Vec<ProviderTimestamp>>) {
        let _ = self.respond.send(Ok(Answer {
            text: text.to_string(),
            timestamps,
        }));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Answered,
    Cancelled,
    Failed,
}

struct FakeTranscripts {
    calls: mpsc::UnboundedSender<PendingTranscript>,
    honor_cancel: bool,
}

#[async_trait]
impl TranscriptClient for FakeTranscripts {
    async fn load_transcript(
        &self,
        video_id: &str,
        _api_key: &str,
        cancel: CancellationToken,
    ) -> Result<TranscriptLoad> {
        let (respond, rx) = oneshot::channel();
        let _ = self.calls.send(PendingTranscript {
            video_id: video_id.to_string(),
            respond,
            cancel: cancel.clone(),
        });

        if self.honor_cancel {
            tokio::select! {
                _ = cancel.cancelled() => Err(RequestError::Cancelled),
                result = rx => result.unwrap_or(Err(RequestError::Cancelled)),
            }
        } else {
            // A transport that cannot abort: the late result is still delivered.
            rx.await.unwrap_or(Err(RequestError::Cancelled))
        }
    }
}

struct FakeQueries {
    calls: mpsc::UnboundedSender<PendingQuery>,
    outcomes: Arc<Mutex<Vec<Outcome>>>,
}

#[async_trait]
impl QueryClient for FakeQueries {
    async fn run_query(
        &self,
        text: &str,
        _video_id: &str,
        model: ModelId,
        _api_key: &str,
        cancel: CancellationToken,
    ) -> Result<Answer> {
        let (respond, rx) = oneshot::channel();
        let _ = self.calls.send(PendingQuery {
            text: text.to_string(),
            model,
            respond,
            cancel: cancel.clone(),
        });

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(RequestError::Cancelled),
            result = rx => result.unwrap_or(Err(RequestError::Cancelled)),
        };
        let outcome = match &result {
            Ok(_) => Outcome::Answered,
            Err(RequestError::Cancelled) => Outcome::Cancelled,
            Err(_) => Outcome::Failed,
        };
        self.outcomes.lock().unwrap().push(outcome);
        result
    }
}

struct Harness {
    handle: SessionHandle,
    storage: Arc<MemoryStorage>,
    transcripts: mpsc::UnboundedReceiver<PendingTranscript>,
    queries: mpsc::UnboundedReceiver<PendingQuery>,
    outcomes: Arc<Mutex<Vec<Outcome>>>,
}

fn values(pairs: &[(StorageKey, &str)]) -> StorageMap {
    pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
}

fn harness_with(initial: StorageMap, honor_cancel: bool) -> Harness {
    let (transcript_tx, transcripts) = mpsc::unbounded_channel();
    let (query_tx, queries) = mpsc::unbounded_channel();
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let storage = Arc::new(MemoryStorage::with_values(initial));

    let handle = start_session(SessionDeps {
        transcripts: Arc::new(FakeTranscripts {
            calls: transcript_tx,
            honor_cancel,
        }),
        queries: Arc::new(FakeQueries {
            calls: query_tx,
            outcomes: outcomes.clone(),
        }),
        storage: storage.clone(),
        default_model: ModelId::Fast,
    });

    Harness {
        handle,
        storage,
        transcripts,
        queries,
        outcomes,
    }
}

fn harness(initial: StorageMap) -> Harness {
    harness_with(initial, true)
}

impl Harness {
    async fn wait_for(&self, mut pred: impl FnMut(&SessionSnapshot) -> bool) -> SessionSnapshot {
        let mut rx = self.handle.subscribe();
        tokio::time::timeout(WAIT, rx.wait_for(|s| pred(s)))
            .await
            .expect("timed out waiting for session state")
            .expect("session closed")
            .clone()
    }

    async fn next_transcript(&mut self) -> PendingTranscript {
        tokio::time::timeout(WAIT, self.transcripts.recv())
            .await
            .expect("timed out waiting for transcript request")
            .expect("transcript client dropped")
    }

    async fn next_query(&mut self) -> PendingQuery {
        tokio::time::timeout(WAIT, self.queries.recv())
            .await
            .expect("timed out waiting for query request")
            .expect("query client dropped")
    }

    async fn set_video(&self, video_id: &str) {
        self.storage
            .set_one(StorageKey::VideoId, video_id.to_string())
            .await
            .unwrap();
    }

    /// Start with a credential and `video_id`, and bring the transcript to Ready.
    async fn ready_on(video_id: &str) -> Harness {
        let mut h = harness(values(&[
            (StorageKey::ApiKey, "secret"),
            (StorageKey::VideoId, video_id),
        ]));
        let pending = h.next_transcript().await;
        assert_eq!(pending.video_id, video_id);
        pending.succeed(&["What is this about?"]);
        h.wait_for(|s| s.phase == Phase::Ready { awaiting_answer: false })
            .await;
        h
    }
}

#[tokio::test]
async fn summarize_scenario_appends_answer_with_citation() {
    let mut h = Harness::ready_on("abc").await;

    let intro = h.handle.snapshot();
    assert_eq!(intro.transcript_state, TranscriptState::Ready);
    assert_eq!(intro.quick_questions, vec!["What is this about?"]);
    assert_eq!(intro.messages.len(), 1);
    assert_eq!(intro.messages[0].text, session::INTRO_TEXT);

    h.handle.submit_query("Summarize this video").await.unwrap();
    let pending = h.next_query().await;
    assert_eq!(pending.text, "Summarize this video");

    let optimistic = h
        .wait_for(|s| s.phase == Phase::Ready { awaiting_answer: true })
        .await;
    assert_eq!(optimistic.messages.len(), 2);
    assert_eq!(optimistic.messages[1].author, Author::User);

    pending.answer(
        "It opens with a greeting [00:05] and moves on.",
        Some(vec![ProviderTimestamp {
            time: "00:05".to_string(),
            text: "greeting".to_string(),
        }]),
    );

    let done = h.wait_for(|s| s.messages.len() == 3).await;
    assert_eq!(done.phase, Phase::Ready { awaiting_answer: false });
    let answer = &done.messages[2];
    assert_eq!(answer.author, Author::Assistant);
    assert!(!answer.is_error);
    assert_eq!(answer.model, Some(ModelId::Fast));
    assert_eq!(answer.citations.len(), 1);
    assert_eq!(answer.citations[0].seconds, 5);
}

#[tokio::test]
async fn stale_transcript_result_is_never_observed() {
    let mut h = harness_with(values(&[(StorageKey::ApiKey, "secret")]), false);
    h.wait_for(|s| s.phase == Phase::AwaitingVideo).await;

    h.set_video("abc").await;
    let first = h.next_transcript().await;
    h.set_video("xyz").await;
    let second = h.next_transcript().await;

    assert_eq!(first.video_id, "abc");
    assert_eq!(second.video_id, "xyz");
    assert!(first.cancel.is_cancelled());

    // The old transport ignores cancellation and answers anyway, before the new one.
    first.succeed(&["stale question"]);
    second.succeed(&["fresh question"]);

    h.wait_for(|s| s.transcript_state == TranscriptState::Ready)
        .await;
    tokio::time::sleep(SETTLE).await;

    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.video_id.as_deref(), Some("xyz"));
    assert_eq!(snapshot.quick_questions, vec!["fresh question"]);
    assert_eq!(snapshot.messages.len(), 1);
}

#[tokio::test]
async fn stale_transcript_arriving_late_is_dropped() {
    let mut h = harness_with(values(&[(StorageKey::ApiKey, "secret")]), false);

    h.set_video("abc").await;
    let first = h.next_transcript().await;
    h.set_video("xyz").await;
    let second = h.next_transcript().await;

    second.succeed(&["fresh question"]);
    h.wait_for(|s| s.transcript_state == TranscriptState::Ready)
        .await;
    first.fail(RequestError::Status { status: 500 });
    tokio::time::sleep(SETTLE).await;

    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.transcript_state, TranscriptState::Ready);
    assert!(snapshot.messages.iter().all(|m| !m.is_error));
}

#[tokio::test]
async fn rapid_queries_keep_only_the_last_answer() {
    let mut h = Harness::ready_on("abc").await;

    for text in ["first", "second", "third"] {
        h.handle.submit_query(text).await.unwrap();
    }

    let mut pending = Vec::new();
    for _ in 0..3 {
        pending.push(h.next_query().await);
    }
    let last = pending
        .iter()
        .position(|p| p.text == "third")
        .map(|i| pending.remove(i))
        .unwrap();
    assert!(pending.iter().all(|p| p.cancel.is_cancelled()));
    assert!(!last.cancel.is_cancelled());

    last.answer("third answer", None);

    let done = h.wait_for(|s| s.messages.len() == 5).await;
    tokio::time::timeout(WAIT, async {
        while h.outcomes.lock().unwrap().len() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(SETTLE).await;

    let outcomes = h.outcomes.lock().unwrap().clone();
    assert_eq!(
        outcomes.iter().filter(|o| **o == Outcome::Cancelled).count(),
        2
    );
    assert_eq!(
        outcomes.iter().filter(|o| **o == Outcome::Answered).count(),
        1
    );

    let users: Vec<_> = done
        .messages
        .iter()
        .filter(|m| m.author == Author::User)
        .map(|m| m.text.as_str())
        .collect();
    assert_eq!(users, vec!["first", "second", "third"]);

    let final_snapshot = h.handle.snapshot();
    assert_eq!(final_snapshot.messages.len(), 5);
    assert_eq!(final_snapshot.messages[4].text, "third answer");
    assert_eq!(final_snapshot.phase, Phase::Ready { awaiting_answer: false });
}

#[tokio::test]
async fn video_change_cancels_outstanding_query() {
    let mut h = Harness::ready_on("abc").await;

    h.handle.submit_query("What happens first?").await.unwrap();
    let query = h.next_query().await;

    h.set_video("xyz").await;
    let transcript = h.next_transcript().await;
    assert_eq!(transcript.video_id, "xyz");

    let switched = h
        .wait_for(|s| s.video_id.as_deref() == Some("xyz"))
        .await;
    assert_eq!(switched.phase, Phase::LoadingTranscript);
    assert!(switched.messages.is_empty());
    assert!(switched.quick_questions.is_empty());
    assert!(query.cancel.is_cancelled());

    query.answer("answer for the old video", None);
    tokio::time::sleep(SETTLE).await;
    assert!(h.handle.snapshot().messages.is_empty());
}

#[tokio::test]
async fn missing_credential_rejects_queries_without_network() {
    let mut h = harness(values(&[(StorageKey::VideoId, "abc")]));
    let waiting = h
        .wait_for(|s| s.video_id.as_deref() == Some("abc"))
        .await;
    assert_eq!(waiting.phase, Phase::NoCredential);

    h.handle.submit_query("Summarize this video").await.unwrap();
    tokio::time::sleep(SETTLE).await;

    assert!(h.transcripts.try_recv().is_err());
    assert!(h.queries.try_recv().is_err());
    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.phase, Phase::NoCredential);
    assert!(snapshot.messages.is_empty());

    // Credential arrives: the known video starts loading.
    h.storage
        .set_one(StorageKey::ApiKey, "secret".to_string())
        .await
        .unwrap();
    let pending = h.next_transcript().await;
    assert_eq!(pending.video_id, "abc");
    h.wait_for(|s| s.phase == Phase::LoadingTranscript).await;
}

#[tokio::test]
async fn echoed_video_id_does_not_reload() {
    let mut h = Harness::ready_on("abc").await;

    h.set_video("abc").await;
    h.set_video("xyz").await;
    assert_eq!(h.next_transcript().await.video_id, "xyz");

    // A local switch writes storage; its echo must not trigger a second load.
    h.handle
        .send(Intent::ChangeVideo("def".to_string()))
        .await
        .unwrap();
    assert_eq!(h.next_transcript().await.video_id, "def");
    h.set_video("ghi").await;
    assert_eq!(h.next_transcript().await.video_id, "ghi");

    assert_eq!(
        h.storage.snapshot().get(&StorageKey::VideoId).map(String::as_str),
        Some("ghi")
    );
}

#[tokio::test]
async fn messages_are_append_only() {
    let mut h = Harness::ready_on("abc").await;

    let mut rx = h.handle.subscribe();
    let observed = tokio::spawn(async move {
        let mut seen: Vec<Vec<String>> = Vec::new();
        while rx.changed().await.is_ok() {
            let ids = rx
                .borrow_and_update()
                .messages
                .iter()
                .map(|m| format!("{}:{}", m.id, m.text))
                .collect();
            seen.push(ids);
        }
        seen
    });

    h.handle.submit_query("one").await.unwrap();
    h.next_query().await.answer("answer one", None);
    h.wait_for(|s| s.messages.len() == 3).await;

    h.handle.submit_query("two").await.unwrap();
    let _ = h
        .next_query()
        .await
        .respond
        .send(Err(RequestError::Status { status: 502 }));
    h.wait_for(|s| s.messages.len() == 5).await;

    h.handle.submit_query("three").await.unwrap();
    let superseded = h.next_query().await;
    h.handle.submit_query("four").await.unwrap();
    let current = h.next_query().await;
    assert!(superseded.cancel.is_cancelled());
    current.answer("answer four", None);
    h.wait_for(|s| s.messages.len() == 8).await;

    let final_snapshot = h.handle.snapshot();
    assert!(final_snapshot.messages[4].is_error);
    assert_eq!(final_snapshot.messages[4].text, session::QUERY_FAILED_TEXT);

    h.handle.close().await;
    let seen = observed.await.unwrap();
    assert!(!seen.is_empty());
    for pair in seen.windows(2) {
        let (before, after) = (&pair[0], &pair[1]);
        assert!(after.len() >= before.len());
        assert_eq!(&after[..before.len()], &before[..]);
    }
}

#[tokio::test]
async fn resubmit_under_other_model_duplicates_the_turn() {
    let mut h = Harness::ready_on("abc").await;

    h.handle.submit_query("Summarize").await.unwrap();
    let first = h.next_query().await;
    assert_eq!(first.model, ModelId::Fast);
    first.answer("short summary", None);
    let answered = h.wait_for(|s| s.messages.len() == 3).await;
    let original = answered.messages[1].clone();

    h.handle
        .send(Intent::Resubmit {
            message_id: original.id.clone(),
            model: ModelId::Thorough,
        })
        .await
        .unwrap();
    let second = h.next_query().await;
    assert_eq!(second.text, "Summarize");
    assert_eq!(second.model, ModelId::Thorough);
    second.answer("long summary", None);

    let done = h.wait_for(|s| s.messages.len() == 5).await;
    assert_eq!(done.selected_model, ModelId::Thorough);
    assert_eq!(done.messages[1].id, original.id);
    assert_eq!(done.messages[1].model, Some(ModelId::Fast));
    assert_eq!(done.messages[3].text, "Summarize");
    assert_eq!(done.messages[3].model, Some(ModelId::Thorough));
    assert_ne!(done.messages[3].id, original.id);
    assert_eq!(done.messages[4].model, Some(ModelId::Thorough));
    assert_eq!(
        h.storage.snapshot().get(&StorageKey::Model).map(String::as_str),
        Some("thorough")
    );
}

#[tokio::test]
async fn resubmit_of_unknown_message_is_ignored() {
    let mut h = Harness::ready_on("abc").await;
    h.handle
        .send(Intent::Resubmit {
            message_id: "missing".to_string(),
            model: ModelId::Thorough,
        })
        .await
        .unwrap();
    tokio::time::sleep(SETTLE).await;
    assert!(h.queries.try_recv().is_err());
    assert_eq!(h.handle.snapshot().messages.len(), 1);
}

#[tokio::test]
async fn transcript_failures_produce_error_messages() {
    let mut h = harness(values(&[
        (StorageKey::ApiKey, "secret"),
        (StorageKey::VideoId, "abc"),
    ]));
    h.next_transcript().await.fail(RequestError::Provider {
        message: "Transcripts are disabled".to_string(),
    });
    let failed = h
        .wait_for(|s| s.transcript_state == TranscriptState::Failed)
        .await;
    assert_eq!(failed.phase, Phase::Ready { awaiting_answer: false });
    assert!(failed.quick_questions.is_empty());
    assert_eq!(failed.messages.len(), 1);
    assert!(failed.messages[0].is_error);
    assert_eq!(failed.messages[0].text, session::TRANSCRIPT_UNAVAILABLE_TEXT);

    h.set_video("xyz").await;
    h.next_transcript()
        .await
        .fail(RequestError::Status { status: 503 });
    let failed = h
        .wait_for(|s| {
            s.video_id.as_deref() == Some("xyz") && s.transcript_state == TranscriptState::Failed
        })
        .await;
    assert_eq!(failed.messages[0].text, session::TRANSCRIPT_FAILED_TEXT);
}

#[tokio::test]
async fn removing_credential_cancels_and_routes_to_entry() {
    let mut h = harness(values(&[
        (StorageKey::ApiKey, "secret"),
        (StorageKey::VideoId, "abc"),
    ]));
    let pending = h.next_transcript().await;

    h.storage.remove(&[StorageKey::ApiKey]).await.unwrap();
    let snapshot = h.wait_for(|s| s.phase == Phase::NoCredential).await;

    assert!(pending.cancel.is_cancelled());
    assert_eq!(snapshot.video_id.as_deref(), Some("abc"));
    assert!(!snapshot.loading_transcript);
}

#[tokio::test]
async fn stored_model_is_used_for_new_queries() {
    let mut h = harness(values(&[
        (StorageKey::ApiKey, "secret"),
        (StorageKey::VideoId, "abc"),
        (StorageKey::Model, "gemini-2.5-pro"),
    ]));
    h.next_transcript().await.succeed(&[]);
    let ready = h
        .wait_for(|s| s.phase == Phase::Ready { awaiting_answer: false })
        .await;
    assert_eq!(ready.selected_model, ModelId::Thorough);

    h.handle.submit_query("Who is speaking?").await.unwrap();
    assert_eq!(h.next_query().await.model, ModelId::Thorough);

    h.handle
        .send(Intent::ChangeModel(ModelId::Fast))
        .await
        .unwrap();
    h.wait_for(|s| s.selected_model == ModelId::Fast).await;
}

#[tokio::test]
async fn close_cancels_in_flight_work() {
    let mut h = harness(values(&[
        (StorageKey::ApiKey, "secret"),
        (StorageKey::VideoId, "abc"),
    ]));
    let pending = h.next_transcript().await;

    h.handle.close().await;
    assert!(pending.cancel.is_cancelled());
}

#[tokio::test]
async fn rejected_credential_on_transcript_routes_to_entry() {
    let mut h = harness(values(&[
        (StorageKey::ApiKey, "revoked"),
        (StorageKey::VideoId, "abc"),
    ]));
    h.next_transcript().await.fail(RequestError::Auth);

    let rejected = h.wait_for(|s| s.phase == Phase::NoCredential).await;
    assert_eq!(rejected.transcript_state, TranscriptState::Idle);
    assert_eq!(rejected.video_id.as_deref(), Some("abc"));
    assert!(rejected.messages.is_empty());
    assert!(!rejected.loading_transcript);
    // The stored key is left for the user to replace.
    assert_eq!(
        h.storage.snapshot().get(&StorageKey::ApiKey).map(String::as_str),
        Some("revoked")
    );

    h.storage
        .set_one(StorageKey::ApiKey, "fresh".to_string())
        .await
        .unwrap();
    let reload = h.next_transcript().await;
    assert_eq!(reload.video_id, "abc");
    h.wait_for(|s| s.phase == Phase::LoadingTranscript).await;
}

#[tokio::test]
async fn rejected_credential_on_query_routes_to_entry() {
    let mut h = Harness::ready_on("abc").await;

    h.handle.submit_query("Summarize").await.unwrap();
    let _ = h
        .next_query()
        .await
        .respond
        .send(Err(RequestError::Auth));

    let rejected = h.wait_for(|s| s.phase == Phase::NoCredential).await;
    assert!(!rejected.awaiting_answer);
    assert_eq!(rejected.messages.len(), 2);
    assert!(rejected.messages.iter().all(|m| !m.is_error));

    h.handle.submit_query("Anyone there?").await.unwrap();
    tokio::time::sleep(SETTLE).await;
    assert!(h.queries.try_recv().is_err());
}

#[tokio::test]
async fn transcript_giving_up_on_its_own_is_a_failure() {
    let mut h = harness(values(&[
        (StorageKey::ApiKey, "secret"),
        (StorageKey::VideoId, "abc"),
    ]));
    h.next_transcript().await.fail(RequestError::Cancelled);

    let failed = h
        .wait_for(|s| s.transcript_state == TranscriptState::Failed)
        .await;
    assert_eq!(failed.phase, Phase::Ready { awaiting_answer: false });
    assert_eq!(failed.messages.len(), 1);
    assert_eq!(failed.messages[0].text, session::TRANSCRIPT_FAILED_TEXT);
}

#[tokio::test]
async fn lagging_storage_subscription_reconciles_to_latest_values() {
    let mut h = Harness::ready_on("abc").await;

    // The coordinator cannot run between these writes, so its subscription overflows.
    for i in 0..100 {
        h.set_video(&format!("v{i}")).await;
    }
    h.storage
        .set_one(StorageKey::Model, "thorough".to_string())
        .await
        .unwrap();

    let pending = h.next_transcript().await;
    assert_eq!(pending.video_id, "v99");
    let snapshot = h
        .wait_for(|s| s.phase == Phase::LoadingTranscript)
        .await;
    assert_eq!(snapshot.video_id.as_deref(), Some("v99"));
    assert_eq!(snapshot.selected_model, ModelId::Thorough);

    tokio::time::sleep(SETTLE).await;
    assert!(h.transcripts.try_recv().is_err());
}

#[tokio::test]
async fn model_written_by_another_context_is_picked_up() {
    let mut h = Harness::ready_on("abc").await;

    h.storage
        .set_one(StorageKey::Model, "thorough".to_string())
        .await
        .unwrap();
    h.wait_for(|s| s.selected_model == ModelId::Thorough).await;
    h.handle.submit_query("Who is speaking?").await.unwrap();
    assert_eq!(h.next_query().await.model, ModelId::Thorough);

    // Removing the stored choice falls back to the default.
    h.storage.remove(&[StorageKey::Model]).await.unwrap();
    h.wait_for(|s| s.selected_model == ModelId::Fast).await;
}

#[tokio::test]
async fn rejected_resubmit_keeps_model_selection() {
    let mut h = Harness::ready_on("abc").await;

    h.handle.submit_query("Summarize").await.unwrap();
    h.next_query().await.answer("short summary", None);
    let answered = h.wait_for(|s| s.messages.len() == 3).await;
    let original = answered.messages[1].id.clone();

    h.storage.remove(&[StorageKey::ApiKey]).await.unwrap();
    h.wait_for(|s| s.phase == Phase::NoCredential).await;

    h.handle
        .send(Intent::Resubmit {
            message_id: original,
            model: ModelId::Thorough,
        })
        .await
        .unwrap();
    tokio::time::sleep(SETTLE).await;

    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.selected_model, ModelId::Fast);
    assert_eq!(snapshot.messages.len(), 3);
    assert_eq!(h.storage.snapshot().get(&StorageKey::Model), None);
    assert!(h.queries.try_recv().is_err());
}
