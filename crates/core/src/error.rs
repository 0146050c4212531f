use thiserror::Error;

/// Failure of a transcript or query request.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Missing API key: set a credential before talking to the backend")]
    Auth,

    #[error("Request was cancelled")]
    Cancelled,

    #[error("API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API request failed with HTTP status {status}")]
    Status { status: u16 },

    #[error("JSON parse error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Backend reported failure: {message}")]
    Provider { message: String },
}

impl RequestError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RequestError::Cancelled)
    }

    /// Network, HTTP and decode failures. Provider failures are reported separately.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RequestError::Transport(_) | RequestError::Status { .. } | RequestError::Decode(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Storage bridge is closed")]
    Closed,
}

pub type Result<T, E = RequestError> = std::result::Result<T, E>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Session is closed")]
pub struct SessionClosed;
