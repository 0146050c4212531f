//! Page-context side: follows host-page navigation and answers popup/seek messages.

use std::sync::Arc;

use reqwest::Url;
use tokio::sync::{broadcast, mpsc};

use crate::{
    error::StorageError,
    messaging::{ExtensionMessage, MessageResponse},
    storage::{StorageBridge, StorageKey},
};

/// Playback control of the host page's video element.
pub trait PlaybackControl: Send + Sync {
    /// Seek to `seconds`. Returns false when the page has no video to seek.
    fn seek(&self, seconds: u32) -> bool;
}

/// Extract the `v` query parameter from a watch-page URL.
pub fn extract_video_id(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    url.query_pairs()
        .find(|(name, _)| name == "v")
        .map(|(_, value)| value.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct PageObserver {
    storage: Arc<dyn StorageBridge>,
    playback: Arc<dyn PlaybackControl>,
    last_url: Option<String>,
    last_written: Option<String>,
    popup_visible: bool,
    notifier: Option<mpsc::UnboundedSender<ExtensionMessage>>,
}

impl PageObserver {
    pub fn new(storage: Arc<dyn StorageBridge>, playback: Arc<dyn PlaybackControl>) -> Self {
        Self {
            storage,
            playback,
            last_url: None,
            last_written: None,
            popup_visible: false,
            notifier: None,
        }
    }

    /// Page-to-background notifications (`popupClosed`) go to `notifier`.
    pub fn with_notifier(mut self, notifier: mpsc::UnboundedSender<ExtensionMessage>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn popup_visible(&self) -> bool {
        self.popup_visible
    }

    /// The page URL changed (or was first seen). Returns the id written, if any.
    pub async fn on_navigation(&mut self, url: &str) -> Result<Option<String>, StorageError> {
        if self.last_url.as_deref() == Some(url) {
            return Ok(None);
        }
        self.last_url = Some(url.to_string());
        self.sync_video_id().await
    }

    /// Write the current page's video id unless it is the one this observer wrote last.
    async fn sync_video_id(&mut self) -> Result<Option<String>, StorageError> {
        let Some(video_id) = self.last_url.as_deref().and_then(extract_video_id) else {
            return Ok(None);
        };
        if self.last_written.as_deref() == Some(video_id.as_str()) {
            return Ok(None);
        }

        self.storage
            .set_one(StorageKey::VideoId, video_id.clone())
            .await?;
        tracing::info!(video_id, "video id saved to storage");
        self.last_written = Some(video_id.clone());
        Ok(Some(video_id))
    }

    pub fn seek(&self, seconds: u32) -> bool {
        let ok = self.playback.seek(seconds);
        if !ok {
            tracing::warn!(seconds, "no video element to seek");
        }
        ok
    }

    pub async fn handle_message(&mut self, message: ExtensionMessage) -> MessageResponse {
        match message {
            ExtensionMessage::Ping => MessageResponse::OK,
            ExtensionMessage::TogglePopup => {
                self.popup_visible = !self.popup_visible;
                if self.popup_visible {
                    if let Err(e) = self.sync_video_id().await {
                        tracing::warn!(error = %e, "failed to sync video id on open");
                    }
                }
                MessageResponse::OK
            }
            ExtensionMessage::ClosePopup => {
                if self.popup_visible {
                    self.popup_visible = false;
                    self.notify(ExtensionMessage::PopupClosed);
                }
                MessageResponse::OK
            }
            ExtensionMessage::SeekToTimestamp { seconds } => MessageResponse {
                success: self.seek(seconds),
            },
            ExtensionMessage::PopupClosed => MessageResponse::FAILED,
        }
    }

    fn notify(&self, message: ExtensionMessage) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        if notifier.send(message).is_err() {
            tracing::debug!("background context gone, notification dropped");
        }
    }

    /// Follow navigations until `urls` closes or shutdown fires.
    pub async fn run(
        mut self,
        mut urls: mpsc::Receiver<String>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), StorageError> {
        loop {
            tokio::select! {
                _ = shutdown.recv() => return Ok(()),
                url = urls.recv() => match url {
                    Some(url) => { self.on_navigation(&url).await?; }
                    None => return Ok(()),
                },
            }
        }
    }
}
