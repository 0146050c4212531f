use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{fs, sync::Mutex};

use crate::{
    error::StorageError,
    storage::{ChangeStream, MemoryStorage, StorageBridge, StorageKey, StorageMap},
};

/// Default location of the persisted bridge
pub fn default_storage_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("tubechat")
        .join("storage.json")
}

/// [`MemoryStorage`] mirrored to a JSON file after every write.
pub struct FileStorage {
    path: PathBuf,
    inner: MemoryStorage,
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Open the store at `path`. A missing file starts empty; unknown keys are ignored.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let values = if fs::try_exists(&path).await? {
            let raw = fs::read_to_string(&path).await?;
            let stored: BTreeMap<String, String> = serde_json::from_str(&raw)?;
            stored
                .into_iter()
                .filter_map(|(name, value)| StorageKey::from_name(&name).map(|k| (k, value)))
                .collect()
        } else {
            StorageMap::new()
        };

        tracing::debug!(path = %path.display(), keys = values.len(), "opened storage");

        Ok(Self {
            path,
            inner: MemoryStorage::with_values(values),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `values` to disk. Callers commit to memory only after this succeeds.
    async fn persist(&self, values: &StorageMap) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(values)?;
        fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl StorageBridge for FileStorage {
    async fn get(&self, keys: &[StorageKey]) -> Result<StorageMap, StorageError> {
        self.inner.get(keys).await
    }

    async fn set(&self, values: StorageMap) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut next = self.inner.snapshot();
        next.extend(values.iter().map(|(k, v)| (*k, v.clone())));
        self.persist(&next).await?;

        let changes = self.inner.apply_set(values);
        self.inner.notify(changes);
        Ok(())
    }

    async fn remove(&self, keys: &[StorageKey]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut next = self.inner.snapshot();
        for key in keys {
            next.remove(key);
        }
        self.persist(&next).await?;

        let changes = self.inner.apply_remove(keys);
        self.inner.notify(changes);
        Ok(())
    }

    fn subscribe(&self) -> ChangeStream {
        self.inner.subscribe()
    }
}
