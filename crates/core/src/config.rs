use std::{path::PathBuf, time::Duration};

use crate::{model::ModelId, storage::default_storage_path};

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub const API_URL_ENV: &str = "TUBECHAT_API_URL";
pub const TIMEOUT_ENV: &str = "TUBECHAT_TIMEOUT_SECS";
pub const API_KEY_ENV: &str = "TUBECHAT_API_KEY";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub storage_path: PathBuf,
    /// Used when storage has no `model` entry.
    pub default_model: ModelId,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout: DEFAULT_TIMEOUT,
            storage_path: default_storage_path(),
            default_model: ModelId::default(),
        }
    }
}

impl Config {
    /// Defaults overridden by `TUBECHAT_API_URL` and `TUBECHAT_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.api_base_url = url;
        }
        if let Some(secs) = std::env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.request_timeout = Duration::from_secs(secs);
        }
        config
    }

    /// Credential from `TUBECHAT_API_KEY`, if set and non-empty.
    pub fn api_key_from_env() -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}
