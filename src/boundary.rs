use async_trait::async_trait;
use tracing::info;

/// One-shot source for the active page's document title.
///
/// The call may fail or return nothing; callers fall back to other title
/// sources.
#[async_trait]
pub trait PageTitleSource: Send + Sync {
    async fn active_title(&self) -> Option<String>;
}

/// Title source returning a fixed value, or nothing at all
pub struct StaticTitleSource {
    title: Option<String>,
}

impl StaticTitleSource {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
        }
    }

    pub fn none() -> Self {
        Self { title: None }
    }
}

#[async_trait]
impl PageTitleSource for StaticTitleSource {
    async fn active_title(&self) -> Option<String> {
        self.title.clone()
    }
}

/// Fire-and-forget user notification boundary.
///
/// Implementations log their own failures; nothing propagates to the
/// caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str);
}

/// Notifier that surfaces notifications in the log
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, message: &str) {
        info!("🔔 {}: {}", title, message);
    }
}
