//! Notification fan-out.
//!
//! Every user-visible message, informational or error, is a [`Notice`] handed
//! to the [`Notifier`], which forwards it to each configured sink.

pub mod dialog;
pub mod system;
pub mod toast;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::NotifyError;

pub use dialog::{Dialog, DialogQueue};
pub use system::{HttpGateway, NotificationGateway, Permission, SystemNotificationSink};
pub use toast::{Toast, ToastBoard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;
    async fn show(&self, notice: &Notice) -> Result<(), NotifyError>;
}

pub struct Notifier {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl Notifier {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }

    pub async fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!(message = %notice.message, "notice"),
            NoticeLevel::Error => error!(message = %notice.message, "notice"),
        }

        for sink in &self.sinks {
            if let Err(e) = sink.show(&notice).await {
                warn!(sink = sink.name(), "notification sink failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    struct BrokenSink;

    #[async_trait]
    impl NotificationSink for BrokenSink {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn show(&self, _notice: &Notice) -> Result<(), NotifyError> {
            Err(NotifyError::Rejected(503))
        }
    }

    #[tokio::test]
    async fn failing_sink_does_not_hide_the_toast() {
        let toasts = Arc::new(ToastBoard::new(Duration::from_secs(3)));
        let sinks: Vec<Arc<dyn NotificationSink>> = vec![Arc::new(BrokenSink), toasts.clone()];
        let notifier = Notifier::new(sinks);

        notifier.notify(Notice::error("Could not save tasks")).await;

        let active = toasts.active(Utc::now()).await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].level, NoticeLevel::Error);
        assert_eq!(active[0].message, "Could not save tasks");
    }
}
