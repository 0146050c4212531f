//! Key-value store shared by every execution context, with change notifications.

pub mod file;
pub mod memory;

pub use file::*;
pub use memory::*;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StorageKey {
    #[serde(rename = "videoId")]
    VideoId,
    #[serde(rename = "apiKey")]
    ApiKey,
    #[serde(rename = "model")]
    Model,
}

impl StorageKey {
    pub const ALL: [StorageKey; 3] = [StorageKey::VideoId, StorageKey::ApiKey, StorageKey::Model];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::VideoId => "videoId",
            StorageKey::ApiKey => "apiKey",
            StorageKey::Model => "model",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        StorageKey::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

pub type StorageMap = BTreeMap<StorageKey, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

pub type ChangeSet = BTreeMap<StorageKey, StorageChange>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Changed(ChangeSet),
    /// Notifications were lost; the subscriber should re-read the keys it cares about.
    Resync,
}

/// Subscription handle. Dropping it unsubscribes.
pub struct ChangeStream {
    rx: broadcast::Receiver<ChangeSet>,
}

impl ChangeStream {
    pub fn new(rx: broadcast::Receiver<ChangeSet>) -> Self {
        Self { rx }
    }

    /// Next notification, or `None` once the bridge is gone. After a lag the retained backlog
    /// is skipped: the subscriber re-reads current values instead.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        match self.rx.recv().await {
            Ok(changes) => Some(ChangeEvent::Changed(changes)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "storage subscriber lagged, requesting resync");
                self.rx = self.rx.resubscribe();
                Some(ChangeEvent::Resync)
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

#[async_trait]
pub trait StorageBridge: Send + Sync {
    async fn get(&self, keys: &[StorageKey]) -> Result<StorageMap, StorageError>;
    async fn set(&self, values: StorageMap) -> Result<(), StorageError>;
    async fn remove(&self, keys: &[StorageKey]) -> Result<(), StorageError>;
    fn subscribe(&self) -> ChangeStream;

    async fn get_one(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        Ok(self.get(&[key]).await?.remove(&key))
    }

    async fn set_one(&self, key: StorageKey, value: String) -> Result<(), StorageError> {
        self.set(StorageMap::from([(key, value)])).await
    }
}
