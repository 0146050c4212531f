use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::{
    client::{
        HttpBackend, cancellable,
        http::{API_KEY_HEADER, Envelope, read_envelope},
        require_api_key,
    },
    error::Result,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLoad {
    pub video_id: String,
    pub quick_questions: Vec<String>,
}

#[async_trait]
pub trait TranscriptClient: Send + Sync {
    /// Ask the backend to ingest the transcript of `video_id`.
    async fn load_transcript(
        &self,
        video_id: &str,
        api_key: &str,
        cancel: CancellationToken,
    ) -> Result<TranscriptLoad>;
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    success: bool,
    #[serde(rename = "quick-questions", default)]
    quick_questions: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

impl Envelope for TranscriptResponse {
    fn success(&self) -> bool {
        self.success
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[async_trait]
impl TranscriptClient for HttpBackend {
    async fn load_transcript(
        &self,
        video_id: &str,
        api_key: &str,
        cancel: CancellationToken,
    ) -> Result<TranscriptLoad> {
        let api_key = require_api_key(api_key)?;
        tracing::info!(video_id, "starting transcript request");

        let request = async {
            let response = self
                .client
                .get(self.endpoint("/api/transcript"))
                .query(&[("video_id", video_id)])
                .header(API_KEY_HEADER, api_key)
                .send()
                .await?;
            read_envelope::<TranscriptResponse>(response).await
        };

        let body = cancellable(&cancel, request).await.inspect_err(|e| {
            if e.is_cancelled() {
                tracing::debug!(video_id, "transcript request cancelled");
            } else {
                tracing::warn!(video_id, error = %e, "transcript request failed");
            }
        })?;

        tracing::info!(video_id, "transcript request completed");
        Ok(TranscriptLoad {
            video_id: video_id.to_string(),
            quick_questions: body.quick_questions,
        })
    }
}
