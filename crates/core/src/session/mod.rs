pub mod coordinator;
pub mod inflight;

pub use coordinator::*;
pub use inflight::*;

use std::sync::Arc;

use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
};

use crate::{
    client::{QueryClient, TranscriptClient},
    error::SessionClosed,
    model::ModelId,
    storage::StorageBridge,
    types::SessionSnapshot,
};

const INTENT_BUFFER: usize = 32;

/// User actions the render surface sends in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Free-form input or a quick-question tap.
    SubmitQuery(String),
    /// Ask an earlier user turn again under another model. Appends a new turn.
    Resubmit { message_id: String, model: ModelId },
    ChangeModel(ModelId),
    ChangeVideo(String),
    Close,
}

pub struct SessionDeps {
    pub transcripts: Arc<dyn TranscriptClient>,
    pub queries: Arc<dyn QueryClient>,
    pub storage: Arc<dyn StorageBridge>,
    pub default_model: ModelId,
}

pub struct SessionHandle {
    intents: mpsc::Sender<Intent>,
    snapshots: watch::Receiver<SessionSnapshot>,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub async fn send(&self, intent: Intent) -> Result<(), SessionClosed> {
        self.intents.send(intent).await.map_err(|_| SessionClosed)
    }

    pub async fn submit_query(&self, text: impl Into<String>) -> Result<(), SessionClosed> {
        self.send(Intent::SubmitQuery(text.into())).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Stop the coordinator and cancel whatever it has in flight.
    pub async fn close(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.task.await;
    }
}

/// Spawn the coordinator. It subscribes to storage before its first read, so no change
/// between the two is lost.
pub fn start_session(deps: SessionDeps) -> SessionHandle {
    let (intents_tx, intents_rx) = mpsc::channel(INTENT_BUFFER);
    let (completions_tx, completions_rx) = mpsc::unbounded_channel();
    let (snapshots_tx, snapshots_rx) = watch::channel(SessionSnapshot::initial());
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let changes = deps.storage.subscribe();
    let coordinator = Coordinator::new(
        deps.transcripts,
        deps.queries,
        deps.storage,
        deps.default_model,
        completions_tx,
        snapshots_tx,
    );

    let task = tokio::spawn(coordinator.run(intents_rx, changes, completions_rx, shutdown_rx));

    SessionHandle {
        intents: intents_tx,
        snapshots: snapshots_rx,
        shutdown_tx,
        task,
    }
}
