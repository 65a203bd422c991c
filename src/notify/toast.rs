use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::NotifyError;
use crate::notify::{Notice, NoticeLevel, NotificationSink};

/// A transient in-app message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub id: Uuid,
    pub level: NoticeLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// In-app message board. Accepts every notice regardless of system
/// notification permission; each toast stays visible for `ttl`.
pub struct ToastBoard {
    ttl: chrono::Duration,
    toasts: Mutex<Vec<Toast>>,
}

impl ToastBoard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(3)),
            toasts: Mutex::new(Vec::new()),
        }
    }

    pub async fn push_at(&self, notice: &Notice, now: DateTime<Utc>) -> Toast {
        let toast = Toast {
            id: Uuid::new_v4(),
            level: notice.level,
            message: notice.message.clone(),
            created_at: now,
            expires_at: now + self.ttl,
        };
        let mut toasts = self.toasts.lock().await;
        toasts.retain(|toast| toast.expires_at > now);
        toasts.push(toast.clone());
        toast
    }

    /// Toasts still visible at `now`, oldest first. Expired ones are dropped.
    pub async fn active(&self, now: DateTime<Utc>) -> Vec<Toast> {
        let mut toasts = self.toasts.lock().await;
        toasts.retain(|toast| toast.expires_at > now);
        toasts.clone()
    }
}

#[async_trait]
impl NotificationSink for ToastBoard {
    fn name(&self) -> &'static str {
        "toast"
    }

    async fn show(&self, notice: &Notice) -> Result<(), NotifyError> {
        self.push_at(notice, Utc::now()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn toast_expires_after_ttl() {
        let board = ToastBoard::new(Duration::from_secs(3));
        let start = Utc::now();

        board.push_at(&Notice::info("Task added successfully!"), start).await;

        assert_eq!(board.active(start).await.len(), 1);
        assert_eq!(
            board.active(start + chrono::Duration::milliseconds(2999)).await.len(),
            1
        );
        assert!(board.active(start + chrono::Duration::seconds(3)).await.is_empty());
    }

    #[tokio::test]
    async fn push_drops_expired_toasts_without_a_reader() {
        let board = ToastBoard::new(Duration::from_secs(3));
        let start = Utc::now();

        for i in 0..10 {
            board
                .push_at(&Notice::info("reminder"), start + chrono::Duration::seconds(i * 5))
                .await;
        }

        assert_eq!(board.toasts.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn toasts_are_listed_oldest_first() {
        let board = ToastBoard::new(Duration::from_secs(3));
        let start = Utc::now();

        board.push_at(&Notice::info("first"), start).await;
        board
            .push_at(&Notice::info("second"), start + chrono::Duration::seconds(1))
            .await;

        let messages: Vec<_> = board
            .active(start + chrono::Duration::seconds(2))
            .await
            .into_iter()
            .map(|t| t.message)
            .collect();
        assert_eq!(messages, vec!["first", "second"]);

        let remaining = board.active(start + chrono::Duration::milliseconds(3500)).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].message, "second");
    }
}
