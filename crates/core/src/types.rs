use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ModelId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranscriptState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Author {
    User,
    Assistant,
}

/// A jump target inside the video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub label: String,
    pub seconds: u32,
}

/// Timestamp entry as the backend returns it alongside an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTimestamp {
    pub time: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub author: Author,
    pub text: String,
    pub citations: Vec<Citation>,
    /// Raw provider list, kept so the render surface can split `text` into fragments.
    pub timestamps: Option<Vec<ProviderTimestamp>>,
    pub is_error: bool,
    pub created_at: SystemTime,
    pub model: Option<ModelId>,
}

impl Message {
    fn new(author: Author, text: impl Into<String>, model: Option<ModelId>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author,
            text: text.into(),
            citations: Vec::new(),
            timestamps: None,
            is_error: false,
            created_at: SystemTime::now(),
            model,
        }
    }

    pub fn user(text: impl Into<String>, model: ModelId) -> Self {
        Self::new(Author::User, text, Some(model))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Author::Assistant, text, None)
    }

    pub fn answer(
        text: impl Into<String>,
        model: ModelId,
        citations: Vec<Citation>,
        timestamps: Option<Vec<ProviderTimestamp>>,
    ) -> Self {
        Self {
            citations,
            timestamps,
            ..Self::new(Author::Assistant, text, Some(model))
        }
    }

    pub fn error(text: impl Into<String>, model: Option<ModelId>) -> Self {
        Self {
            is_error: true,
            ..Self::new(Author::Assistant, text, model)
        }
    }

    pub fn is_user(&self) -> bool {
        self.author == Author::User
    }
}

/// The coordinator's view of the open popup. One per coordinator lifetime.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub active_video_id: Option<String>,
    pub transcript_state: TranscriptState,
    pub quick_questions: Vec<String>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    NoCredential,
    AwaitingVideo,
    LoadingTranscript,
    Ready { awaiting_answer: bool },
}

/// What the render surface receives on every transition.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub video_id: Option<String>,
    pub transcript_state: TranscriptState,
    pub quick_questions: Vec<String>,
    pub messages: Vec<Message>,
    pub selected_model: ModelId,
    pub loading_transcript: bool,
    pub awaiting_answer: bool,
}

impl SessionSnapshot {
    pub fn initial() -> Self {
        Self {
            phase: Phase::NoCredential,
            video_id: None,
            transcript_state: TranscriptState::Idle,
            quick_questions: Vec::new(),
            messages: Vec::new(),
            selected_model: ModelId::default(),
            loading_transcript: false,
            awaiting_answer: false,
        }
    }
}
