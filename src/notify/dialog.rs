use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::NotifyError;
use crate::notify::{Notice, NoticeLevel, NotificationSink};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dialog {
    pub id: Uuid,
    pub level: NoticeLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Messages that stay open until the user dismisses them.
#[derive(Default)]
pub struct DialogQueue {
    open: Mutex<Vec<Dialog>>,
}

impl DialogQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(&self) -> Vec<Dialog> {
        self.open.lock().await.clone()
    }

    /// Returns `false` when no dialog has this id.
    pub async fn dismiss(&self, id: Uuid) -> bool {
        let mut open = self.open.lock().await;
        let before = open.len();
        open.retain(|dialog| dialog.id != id);
        open.len() != before
    }
}

#[async_trait]
impl NotificationSink for DialogQueue {
    fn name(&self) -> &'static str {
        "dialog"
    }

    async fn show(&self, notice: &Notice) -> Result<(), NotifyError> {
        self.open.lock().await.push(Dialog {
            id: Uuid::new_v4(),
            level: notice.level,
            message: notice.message.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dialogs_stay_until_dismissed() {
        let queue = DialogQueue::new();
        queue.show(&Notice::info("Task deleted!")).await.expect("show");
        queue.show(&Notice::error("Could not save")).await.expect("show");

        let open = queue.open().await;
        assert_eq!(open.len(), 2);

        assert!(queue.dismiss(open[0].id).await);
        assert!(!queue.dismiss(open[0].id).await);

        let open = queue.open().await;
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].message, "Could not save");
    }
}
