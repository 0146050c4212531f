//! Messages exchanged between the background router, the page context and the popup.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ExtensionMessage {
    Ping,
    TogglePopup,
    ClosePopup,
    PopupClosed,
    SeekToTimestamp { seconds: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
}

impl MessageResponse {
    pub const OK: MessageResponse = MessageResponse { success: true };
    pub const FAILED: MessageResponse = MessageResponse { success: false };
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("No receiver in tab {tab_id}")]
    NoReceiver { tab_id: u32 },

    #[error("Script injection failed for tab {tab_id}: {reason}")]
    InjectionFailed { tab_id: u32, reason: String },
}

/// Delivery of messages to the page context of a tab.
#[async_trait]
pub trait TabChannel: Send + Sync {
    async fn send(
        &self,
        tab_id: u32,
        message: ExtensionMessage,
    ) -> Result<MessageResponse, ChannelError>;

    /// Inject the page-context script into the tab.
    async fn inject(&self, tab_id: u32) -> Result<(), ChannelError>;
}

/// Time the freshly injected page script gets to install its listener.
pub const INJECT_SETTLE: Duration = Duration::from_millis(100);

/// Background-context handling of the extension action and of page notifications.
pub struct BackgroundRouter<C> {
    channel: C,
}

impl<C: TabChannel> BackgroundRouter<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// The action icon was clicked: make sure the page script is present, then toggle.
    pub async fn on_action_clicked(&self, tab_id: u32) {
        if let Err(e) = self.show_popup(tab_id).await {
            tracing::error!(tab_id, error = %e, "failed to toggle popup");
        }
    }

    async fn show_popup(&self, tab_id: u32) -> Result<(), ChannelError> {
        match self.channel.send(tab_id, ExtensionMessage::Ping).await {
            Ok(_) => {
                tracing::debug!(tab_id, "page script present, toggling popup");
            }
            Err(_) => {
                tracing::info!(tab_id, "page script not found, injecting");
                self.channel.inject(tab_id).await?;
                tokio::time::sleep(INJECT_SETTLE).await;
            }
        }
        self.channel
            .send(tab_id, ExtensionMessage::TogglePopup)
            .await?;
        Ok(())
    }

    /// Page-to-background notifications are acknowledged unconditionally.
    pub fn on_message(&self, message: &ExtensionMessage) -> MessageResponse {
        if *message == ExtensionMessage::PopupClosed {
            tracing::debug!("popup closed");
        }
        MessageResponse::OK
    }
}
