pub mod citation;
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod messaging;
pub mod model;
pub mod observer;
pub mod session;
pub mod storage;
pub mod types;

pub use citation::{Fragment, correlate, fragments};
pub use client::{Answer, HttpBackend, QueryClient, TranscriptClient, TranscriptLoad};
pub use config::Config;
pub use error::{RequestError, Result, SessionClosed, StorageError};
pub use format::{format_timestamp, parse_timestamp};
pub use messaging::{
    BackgroundRouter, ChannelError, ExtensionMessage, MessageResponse, TabChannel,
};
pub use model::ModelId;
pub use observer::{PageObserver, PlaybackControl, extract_video_id};
pub use session::{Intent, SessionDeps, SessionHandle, start_session};
pub use storage::{FileStorage, MemoryStorage, StorageBridge, StorageKey, StorageMap};
pub use types::{
    Author, Citation, Message, Phase, ProviderTimestamp, Session, SessionSnapshot,
    TranscriptState,
};
