use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use console::style;
use tokio::sync::Mutex;
use tubechat_core::{
    ChannelError, ExtensionMessage, MessageResponse, PageObserver, PlaybackControl, StorageError,
    TabChannel, format_timestamp,
};

/// The only tab the terminal has.
pub const TERMINAL_TAB: u32 = 1;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// No video element in a terminal, so seeks are echoed.
pub struct TerminalPlayer;

impl PlaybackControl for TerminalPlayer {
    fn seek(&self, seconds: u32) -> bool {
        println!(
            "{} seek to {}",
            style("⏩").cyan(),
            style(format_timestamp(seconds)).bold()
        );
        true
    }
}

/// Bare ids become a watch-page URL so every switch is a navigation.
pub fn watch_url(video: &str) -> String {
    let video = video.trim();
    if video.contains("://") {
        video.to_string()
    } else {
        format!("{WATCH_URL}{video}")
    }
}

/// Navigate the page to `video` (URL or id). Returns the id written to storage, if any.
pub async fn navigate(
    page: &Mutex<PageObserver>,
    video: &str,
) -> Result<Option<String>, StorageError> {
    page.lock().await.on_navigation(&watch_url(video)).await
}

/// In-process tab: the page script answers once it has been injected.
pub struct LocalTab {
    page: Arc<Mutex<PageObserver>>,
    injected: AtomicBool,
}

impl LocalTab {
    pub fn new(page: Arc<Mutex<PageObserver>>) -> Self {
        Self {
            page,
            injected: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl TabChannel for LocalTab {
    async fn send(
        &self,
        tab_id: u32,
        message: ExtensionMessage,
    ) -> Result<MessageResponse, ChannelError> {
        if tab_id != TERMINAL_TAB || !self.injected.load(Ordering::Acquire) {
            return Err(ChannelError::NoReceiver { tab_id });
        }
        Ok(self.page.lock().await.handle_message(message).await)
    }

    async fn inject(&self, tab_id: u32) -> Result<(), ChannelError> {
        if tab_id != TERMINAL_TAB {
            return Err(ChannelError::InjectionFailed {
                tab_id,
                reason: "no such tab".to_string(),
            });
        }
        self.injected.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tubechat_core::{BackgroundRouter, MemoryStorage, StorageBridge, StorageKey};

    use super::*;

    fn page(storage: Arc<MemoryStorage>) -> Arc<Mutex<PageObserver>> {
        Arc::new(Mutex::new(PageObserver::new(storage, Arc::new(TerminalPlayer))))
    }

    #[test]
    fn bare_ids_become_watch_urls() {
        assert_eq!(watch_url(" abc "), "https://www.youtube.com/watch?v=abc");
        assert_eq!(
            watch_url("https://www.youtube.com/watch?v=xyz&t=1s"),
            "https://www.youtube.com/watch?v=xyz&t=1s"
        );
    }

    #[tokio::test]
    async fn switching_back_to_a_url_after_an_id_writes_again() {
        let storage = Arc::new(MemoryStorage::new());
        let page = page(storage.clone());

        navigate(&page, "https://www.youtube.com/watch?v=xyz").await.unwrap();
        navigate(&page, "abc").await.unwrap();
        let written = navigate(&page, "https://www.youtube.com/watch?v=xyz&t=1s")
            .await
            .unwrap();

        assert_eq!(written.as_deref(), Some("xyz"));
        assert_eq!(
            storage.get_one(StorageKey::VideoId).await.unwrap().as_deref(),
            Some("xyz")
        );
    }

    #[tokio::test]
    async fn action_click_injects_then_toggles() {
        let storage = Arc::new(MemoryStorage::new());
        let page = page(storage);
        let router = BackgroundRouter::new(LocalTab::new(page.clone()));

        assert!(
            router
                .channel()
                .send(TERMINAL_TAB, ExtensionMessage::Ping)
                .await
                .is_err()
        );

        router.on_action_clicked(TERMINAL_TAB).await;
        assert!(page.lock().await.popup_visible());

        router.on_action_clicked(TERMINAL_TAB).await;
        assert!(!page.lock().await.popup_visible());
    }
}
