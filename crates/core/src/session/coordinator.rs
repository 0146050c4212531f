use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};

use crate::{
    citation::correlate,
    client::{Answer, QueryClient, TranscriptClient, TranscriptLoad},
    error::{RequestError, Result},
    model::ModelId,
    session::{
        Intent,
        inflight::{CorrelationKey, InFlightSlot, RequestKind},
    },
    storage::{ChangeEvent, ChangeSet, ChangeStream, StorageBridge, StorageKey, StorageMap},
    types::{Message, Phase, Session, SessionSnapshot, TranscriptState},
};

pub const INTRO_TEXT: &str =
    "Hi! I'm ready to answer questions about this video. What would you like to know?";
pub const TRANSCRIPT_UNAVAILABLE_TEXT: &str =
    "Sorry, I couldn't load the transcript for this video. Please try another video.";
pub const TRANSCRIPT_FAILED_TEXT: &str =
    "Sorry, there was an error loading the video transcript. Please try again later.";
pub const QUERY_FAILED_TEXT: &str =
    "Sorry, I encountered an error while processing your question. Please try again.";

pub(crate) enum Completion {
    Transcript {
        seq: u64,
        video_id: String,
        result: Result<TranscriptLoad>,
    },
    Query {
        seq: u64,
        key: CorrelationKey,
        model: ModelId,
        result: Result<Answer>,
    },
}

/// Owns the session and every in-flight request. Runs as a single task; client calls are
/// spawned and report back through `completions`.
pub struct Coordinator {
    transcripts: Arc<dyn TranscriptClient>,
    queries: Arc<dyn QueryClient>,
    storage: Arc<dyn StorageBridge>,

    session: Session,
    api_key: Option<String>,
    selected_model: ModelId,
    default_model: ModelId,
    last_video_id: Option<String>,

    transcript: InFlightSlot,
    query: InFlightSlot,

    completions: mpsc::UnboundedSender<Completion>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl Coordinator {
    pub(crate) fn new(
        transcripts: Arc<dyn TranscriptClient>,
        queries: Arc<dyn QueryClient>,
        storage: Arc<dyn StorageBridge>,
        default_model: ModelId,
        completions: mpsc::UnboundedSender<Completion>,
        snapshots: watch::Sender<SessionSnapshot>,
    ) -> Self {
        Self {
            transcripts,
            queries,
            storage,
            session: Session::default(),
            api_key: None,
            selected_model: default_model,
            default_model,
            last_video_id: None,
            transcript: InFlightSlot::new(RequestKind::Transcript),
            query: InFlightSlot::new(RequestKind::Query),
            completions,
            snapshots,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut intents: mpsc::Receiver<Intent>,
        mut changes: ChangeStream,
        mut completions: mpsc::UnboundedReceiver<Completion>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        self.reconcile().await;
        self.publish();

        let mut storage_open = true;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                change = changes.next(), if storage_open => match change {
                    Some(ChangeEvent::Changed(set)) => self.apply_changes(set),
                    Some(ChangeEvent::Resync) => self.reconcile().await,
                    None => {
                        tracing::warn!("storage bridge closed, no further video changes will be seen");
                        storage_open = false;
                    }
                },
                Some(done) = completions.recv() => self.on_completion(done),
                intent = intents.recv() => match intent {
                    Some(Intent::Close) | None => break,
                    Some(intent) => self.on_intent(intent).await,
                },
            }
            self.publish();
        }

        self.teardown();
        self.publish();
    }

    pub fn phase(&self) -> Phase {
        if self.api_key.is_none() {
            return Phase::NoCredential;
        }
        if self.session.active_video_id.is_none() {
            return Phase::AwaitingVideo;
        }
        match self.session.transcript_state {
            TranscriptState::Idle => Phase::AwaitingVideo,
            TranscriptState::Loading => Phase::LoadingTranscript,
            TranscriptState::Ready | TranscriptState::Failed => Phase::Ready {
                awaiting_answer: self.query.is_active(),
            },
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            video_id: self.session.active_video_id.clone(),
            transcript_state: self.session.transcript_state,
            quick_questions: self.session.quick_questions.clone(),
            messages: self.session.messages.clone(),
            selected_model: self.selected_model,
            loading_transcript: self.transcript.is_active(),
            awaiting_answer: self.query.is_active(),
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    // ---- storage -------------------------------------------------------------------------

    async fn reconcile(&mut self) {
        match self.storage.get(&StorageKey::ALL).await {
            Ok(values) => self.apply_values(values),
            Err(e) => tracing::warn!(error = %e, "failed to read storage"),
        }
    }

    fn apply_values(&mut self, mut values: StorageMap) {
        self.on_model(values.get(&StorageKey::Model).map(String::as_str));
        self.on_api_key(values.remove(&StorageKey::ApiKey));
        if let Some(video_id) = values.remove(&StorageKey::VideoId) {
            self.on_video(video_id);
        }
    }

    fn apply_changes(&mut self, mut changes: ChangeSet) {
        if let Some(change) = changes.remove(&StorageKey::Model) {
            self.on_model(change.new_value.as_deref());
        }
        if let Some(change) = changes.remove(&StorageKey::ApiKey) {
            self.on_api_key(change.new_value);
        }
        if let Some(video_id) = changes
            .remove(&StorageKey::VideoId)
            .and_then(|c| c.new_value)
        {
            self.on_video(video_id);
        }
    }

    fn on_model(&mut self, value: Option<&str>) {
        self.selected_model = value
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.default_model);
    }

    fn on_api_key(&mut self, value: Option<String>) {
        let had_key = self.api_key.is_some();
        self.api_key = value
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        match (had_key, self.api_key.is_some()) {
            (false, true) => {
                tracing::info!("credential available");
                if let Some(video_id) = self.session.active_video_id.clone() {
                    self.begin_transcript(video_id);
                }
            }
            (true, false) => {
                tracing::info!("credential removed");
                self.drop_credential();
            }
            _ => {}
        }
    }

    /// Handles both storage notifications and local switches; a repeat of the last processed
    /// id (including the echo of our own write) is ignored.
    fn on_video(&mut self, video_id: String) {
        if self.last_video_id.as_deref() == Some(video_id.as_str()) {
            tracing::debug!(video_id, "video id unchanged, ignoring");
            return;
        }

        tracing::info!(video_id, previous = ?self.last_video_id, "active video changed");
        self.last_video_id = Some(video_id.clone());
        self.session.active_video_id = Some(video_id.clone());

        if self.api_key.is_some() {
            self.begin_transcript(video_id);
        } else {
            self.reset_for_video();
        }
    }

    // ---- transcript ----------------------------------------------------------------------

    fn reset_for_video(&mut self) {
        self.query.cancel();
        self.transcript.cancel();
        self.session.messages.clear();
        self.session.quick_questions.clear();
        self.session.transcript_state = TranscriptState::Idle;
    }

    fn begin_transcript(&mut self, video_id: String) {
        self.reset_for_video();

        let Some(api_key) = self.api_key.clone() else {
            return;
        };

        self.session.transcript_state = TranscriptState::Loading;
        let (seq, cancel) = self
            .transcript
            .start(CorrelationKey::Video(video_id.clone()));

        let client = Arc::clone(&self.transcripts);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = client.load_transcript(&video_id, &api_key, cancel).await;
            let _ = completions.send(Completion::Transcript {
                seq,
                video_id,
                result,
            });
        });
    }

    fn on_completion(&mut self, done: Completion) {
        match done {
            Completion::Transcript {
                seq,
                video_id,
                result,
            } => self.on_transcript_done(seq, video_id, result),
            Completion::Query {
                seq,
                key,
                model,
                result,
            } => self.on_query_done(seq, key, model, result),
        }
    }

    fn is_active_video(&self, video_id: &str) -> bool {
        self.session.active_video_id.as_deref() == Some(video_id)
    }

    fn on_transcript_done(&mut self, seq: u64, video_id: String, result: Result<TranscriptLoad>) {
        let key = CorrelationKey::Video(video_id);
        if !self.transcript.is_current(seq, &key) || !self.is_active_video(key.video_id()) {
            tracing::debug!(seq, key = ?key, "discarding stale transcript result");
            return;
        }
        self.transcript.finish(seq);

        match result {
            Ok(load) => {
                self.session.transcript_state = TranscriptState::Ready;
                self.session.quick_questions = load.quick_questions;
                self.session.messages.push(Message::assistant(INTRO_TEXT));
            }
            Err(RequestError::Auth) => {
                self.session.transcript_state = TranscriptState::Idle;
                self.reject_credential();
            }
            Err(e) => {
                tracing::warn!(video_id = key.video_id(), error = %e, "transcript load failed");
                // A live request only reports Cancelled when the client gave up on its own.
                let text = if e.is_transport() || e.is_cancelled() {
                    TRANSCRIPT_FAILED_TEXT
                } else {
                    TRANSCRIPT_UNAVAILABLE_TEXT
                };
                self.session.transcript_state = TranscriptState::Failed;
                self.session.quick_questions.clear();
                self.session.messages.push(Message::error(text, None));
            }
        }
    }

    // ---- queries -------------------------------------------------------------------------

    /// Credential and video a query would run against, or `None` when it must be rejected.
    fn query_target(&self, text: &str) -> Option<(String, String)> {
        if text.trim().is_empty() {
            return None;
        }
        let Some(api_key) = self.api_key.clone() else {
            tracing::warn!("query rejected, no credential");
            return None;
        };
        let Some(video_id) = self.session.active_video_id.clone() else {
            tracing::warn!("query rejected, no active video");
            return None;
        };
        if !matches!(
            self.session.transcript_state,
            TranscriptState::Ready | TranscriptState::Failed
        ) {
            tracing::warn!(video_id, "query rejected, transcript not loaded");
            return None;
        }
        Some((api_key, video_id))
    }

    fn submit(&mut self, text: &str, model: ModelId) -> bool {
        let text = text.trim();
        let Some((api_key, video_id)) = self.query_target(text) else {
            return false;
        };

        self.session.messages.push(Message::user(text, model));

        let key = CorrelationKey::Query {
            text: text.to_string(),
            video_id: video_id.clone(),
        };
        let (seq, cancel) = self.query.start(key.clone());

        let client = Arc::clone(&self.queries);
        let completions = self.completions.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            let result = client
                .run_query(&text, &video_id, model, &api_key, cancel)
                .await;
            let _ = completions.send(Completion::Query {
                seq,
                key,
                model,
                result,
            });
        });
        true
    }

    fn on_query_done(
        &mut self,
        seq: u64,
        key: CorrelationKey,
        model: ModelId,
        result: Result<Answer>,
    ) {
        if !self.query.is_current(seq, &key) || !self.is_active_video(key.video_id()) {
            tracing::debug!(seq, key = ?key, "discarding stale query result");
            return;
        }
        self.query.finish(seq);

        match result {
            Ok(answer) => {
                let citations = correlate(&answer.text, answer.timestamps.as_deref());
                self.session.messages.push(Message::answer(
                    answer.text,
                    model,
                    citations,
                    answer.timestamps,
                ));
            }
            Err(RequestError::Cancelled) => {}
            Err(RequestError::Auth) => self.reject_credential(),
            Err(e) => {
                tracing::warn!(key = ?key, error = %e, "query failed");
                self.session
                    .messages
                    .push(Message::error(QUERY_FAILED_TEXT, Some(model)));
            }
        }
    }

    // ---- intents -------------------------------------------------------------------------

    async fn on_intent(&mut self, intent: Intent) {
        match intent {
            Intent::SubmitQuery(text) => {
                self.submit(&text, self.selected_model);
            }
            Intent::Resubmit { message_id, model } => {
                let Some(text) = self
                    .session
                    .messages
                    .iter()
                    .find(|m| m.id == message_id && m.is_user())
                    .map(|m| m.text.clone())
                else {
                    tracing::warn!(message_id, "resubmit target not found");
                    return;
                };
                if self.query_target(&text).is_none() {
                    return;
                }
                self.change_model(model).await;
                self.submit(&text, model);
            }
            Intent::ChangeModel(model) => self.change_model(model).await,
            Intent::ChangeVideo(video_id) => {
                let video_id = video_id.trim().to_string();
                if video_id.is_empty() {
                    return;
                }
                self.on_video(video_id.clone());
                if let Err(e) = self.storage.set_one(StorageKey::VideoId, video_id).await {
                    tracing::warn!(error = %e, "failed to persist video id");
                }
            }
            Intent::Close => {}
        }
    }

    async fn change_model(&mut self, model: ModelId) {
        self.selected_model = model;
        if let Err(e) = self
            .storage
            .set_one(StorageKey::Model, model.name().to_string())
            .await
        {
            tracing::warn!(error = %e, "failed to persist model selection");
        }
    }

    // ---- credential ----------------------------------------------------------------------

    fn drop_credential(&mut self) {
        self.query.cancel();
        if self.transcript.cancel() {
            self.session.transcript_state = TranscriptState::Idle;
        }
    }

    fn reject_credential(&mut self) {
        tracing::warn!("backend call attempted without a usable credential");
        self.api_key = None;
        self.drop_credential();
    }

    fn teardown(&mut self) {
        let cancelled = [self.transcript.cancel(), self.query.cancel()]
            .into_iter()
            .filter(|c| *c)
            .count();
        tracing::info!(cancelled, "session closed");
    }
}
