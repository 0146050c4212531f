use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    client::{
        HttpBackend, cancellable,
        http::{API_KEY_HEADER, Envelope, read_envelope},
        require_api_key,
    },
    error::Result,
    model::ModelId,
    types::ProviderTimestamp,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    /// `None` when the backend sent no timestamp list at all.
    pub timestamps: Option<Vec<ProviderTimestamp>>,
}

#[async_trait]
pub trait QueryClient: Send + Sync {
    /// Ask `text` about the transcript loaded for `video_id`.
    async fn run_query(
        &self,
        text: &str,
        video_id: &str,
        model: ModelId,
        api_key: &str,
        cancel: CancellationToken,
    ) -> Result<Answer>;
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    video_id: &'a str,
    model: &'static str,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    success: bool,
    #[serde(default)]
    response: String,
    #[serde(default)]
    timestamps: Option<Vec<ProviderTimestamp>>,
    #[serde(default)]
    error: Option<String>,
}

impl Envelope for QueryResponse {
    fn success(&self) -> bool {
        self.success
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[async_trait]
impl QueryClient for HttpBackend {
    async fn run_query(
        &self,
        text: &str,
        video_id: &str,
        model: ModelId,
        api_key: &str,
        cancel: CancellationToken,
    ) -> Result<Answer> {
        let api_key = require_api_key(api_key)?;
        tracing::info!(video_id, %model, query = text, "starting query request");

        let request = async {
            let response = self
                .client
                .post(self.endpoint("/api/query"))
                .header(API_KEY_HEADER, api_key)
                .json(&QueryRequest {
                    query: text,
                    video_id,
                    model: model.api_name(),
                })
                .send()
                .await?;
            read_envelope::<QueryResponse>(response).await
        };

        let body = cancellable(&cancel, request).await.inspect_err(|e| {
            if e.is_cancelled() {
                tracing::debug!(video_id, query = text, "query request cancelled");
            } else {
                tracing::warn!(video_id, error = %e, "query request failed");
            }
        })?;

        tracing::info!(video_id, query = text, "query request completed");
        Ok(Answer {
            text: body.response,
            timestamps: body.timestamps,
        })
    }
}
