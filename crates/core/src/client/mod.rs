//! Cancellable adapters for the transcript and query endpoints.

pub mod http;
pub mod query;
pub mod transcript;

pub use http::*;
pub use query::*;
pub use transcript::*;

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{RequestError, Result};

/// Race `fut` against `cancel`. A request whose token fired is reported as cancelled even if
/// the transport managed to finish.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    if cancel.is_cancelled() {
        return Err(RequestError::Cancelled);
    }

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(RequestError::Cancelled),
        result = fut => result,
    };

    if cancel.is_cancelled() {
        return Err(RequestError::Cancelled);
    }
    result
}

pub(crate) fn require_api_key(api_key: &str) -> Result<&str> {
    let key = api_key.trim();
    if key.is_empty() {
        return Err(RequestError::Auth);
    }
    Ok(key)
}
