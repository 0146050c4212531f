use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::{
    config::Config,
    error::{RequestError, Result},
};

pub(crate) const API_KEY_HEADER: &str = "X-API-Key";

/// reqwest-backed implementation of [`TranscriptClient`](super::TranscriptClient) and
/// [`QueryClient`](super::QueryClient).
#[derive(Clone)]
pub struct HttpBackend {
    pub(crate) client: Client,
    pub(crate) base_url: String,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Envelope fields every backend response carries.
pub(crate) trait Envelope {
    fn success(&self) -> bool;
    fn error(&self) -> Option<&str>;
}

/// Decode a backend response. `success: false` becomes [`RequestError::Provider`] even on
/// non-2xx statuses, since the backend reports validation failures that way.
pub(crate) async fn read_envelope<T>(response: Response) -> Result<T>
where
    T: DeserializeOwned + Envelope,
{
    let status = response.status();
    let body = response.bytes().await?;

    let decoded = match serde_json::from_slice::<T>(&body) {
        Ok(decoded) => decoded,
        Err(e) if status.is_success() => return Err(RequestError::Decode(e)),
        Err(_) => {
            return Err(RequestError::Status {
                status: status.as_u16(),
            });
        }
    };

    if !decoded.success() {
        return Err(RequestError::Provider {
            message: decoded
                .error()
                .unwrap_or("request was not successful")
                .to_string(),
        });
    }
    if !status.is_success() {
        return Err(RequestError::Status {
            status: status.as_u16(),
        });
    }
    Ok(decoded)
}
