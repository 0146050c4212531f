use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{
    error::StorageError,
    storage::{ChangeSet, ChangeStream, StorageBridge, StorageChange, StorageKey, StorageMap},
};

const CHANGE_BUFFER: usize = 64;

/// In-process bridge. Every write is reported to subscribers, even when the value is unchanged.
pub struct MemoryStorage {
    values: Mutex<StorageMap>,
    changes: broadcast::Sender<ChangeSet>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_values(StorageMap::new())
    }

    pub fn with_values(values: StorageMap) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            values: Mutex::new(values),
            changes,
        }
    }

    pub fn snapshot(&self) -> StorageMap {
        self.values.lock().expect("MemoryStorage poisoned").clone()
    }

    pub(crate) fn apply_set(&self, values: StorageMap) -> ChangeSet {
        let mut current = self.values.lock().expect("MemoryStorage poisoned");
        values
            .into_iter()
            .map(|(key, value)| {
                let old_value = current.insert(key, value.clone());
                (
                    key,
                    StorageChange {
                        old_value,
                        new_value: Some(value),
                    },
                )
            })
            .collect()
    }

    pub(crate) fn apply_remove(&self, keys: &[StorageKey]) -> ChangeSet {
        let mut current = self.values.lock().expect("MemoryStorage poisoned");
        keys.iter()
            .filter_map(|key| {
                current.remove(key).map(|old| {
                    (
                        *key,
                        StorageChange {
                            old_value: Some(old),
                            new_value: None,
                        },
                    )
                })
            })
            .collect()
    }

    pub(crate) fn notify(&self, changes: ChangeSet) {
        if changes.is_empty() {
            return;
        }
        // No subscribers is fine.
        let _ = self.changes.send(changes);
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBridge for MemoryStorage {
    async fn get(&self, keys: &[StorageKey]) -> Result<StorageMap, StorageError> {
        let current = self.values.lock().expect("MemoryStorage poisoned");
        Ok(keys
            .iter()
            .filter_map(|k| current.get(k).map(|v| (*k, v.clone())))
            .collect())
    }

    async fn set(&self, values: StorageMap) -> Result<(), StorageError> {
        let changes = self.apply_set(values);
        self.notify(changes);
        Ok(())
    }

    async fn remove(&self, keys: &[StorageKey]) -> Result<(), StorageError> {
        let changes = self.apply_remove(keys);
        self.notify(changes);
        Ok(())
    }

    fn subscribe(&self) -> ChangeStream {
        ChangeStream::new(self.changes.subscribe())
    }
}
