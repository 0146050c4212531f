use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Transcript,
    Query,
}

/// What a result must match to still be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationKey {
    Video(String),
    Query { text: String, video_id: String },
}

impl CorrelationKey {
    pub fn video_id(&self) -> &str {
        match self {
            CorrelationKey::Video(video_id) => video_id,
            CorrelationKey::Query { video_id, .. } => video_id,
        }
    }
}

#[derive(Debug)]
pub struct InFlightRequest {
    pub kind: RequestKind,
    pub seq: u64,
    pub key: CorrelationKey,
    cancel: CancellationToken,
}

/// Holds at most one live request of a kind. Starting a new one cancels the previous one,
/// and the sequence bump makes any late result from it unrecognisable.
#[derive(Debug)]
pub struct InFlightSlot {
    kind: RequestKind,
    next_seq: u64,
    current: Option<InFlightRequest>,
}

impl InFlightSlot {
    pub fn new(kind: RequestKind) -> Self {
        Self {
            kind,
            next_seq: 0,
            current: None,
        }
    }

    pub fn start(&mut self, key: CorrelationKey) -> (u64, CancellationToken) {
        self.cancel();

        self.next_seq += 1;
        let seq = self.next_seq;
        let cancel = CancellationToken::new();
        self.current = Some(InFlightRequest {
            kind: self.kind,
            seq,
            key,
            cancel: cancel.clone(),
        });
        (seq, cancel)
    }

    /// Cancel the live request, if any. Returns whether one was live.
    pub fn cancel(&mut self) -> bool {
        let Some(request) = self.current.take() else {
            return false;
        };
        tracing::debug!(kind = ?request.kind, seq = request.seq, key = ?request.key, "superseding in-flight request");
        request.cancel.cancel();
        true
    }

    pub fn is_current(&self, seq: u64, key: &CorrelationKey) -> bool {
        self.current
            .as_ref()
            .is_some_and(|r| r.seq == seq && &r.key == key)
    }

    /// Release the slot if `seq` is still the live request.
    pub fn finish(&mut self, seq: u64) -> Option<InFlightRequest> {
        if self.current.as_ref().is_some_and(|r| r.seq == seq) {
            self.current.take()
        } else {
            None
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&InFlightRequest> {
        self.current.as_ref()
    }
}
