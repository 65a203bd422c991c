use std::sync::Arc;

use tracing::{debug, warn};

use crate::db::KvStore;
use crate::error::PersistError;
use crate::models::Task;

/// Key under which the whole task collection is stored.
pub const TASKS_KEY: &str = "tasks";

/// Loads and saves the ordered task collection as one JSON value.
#[derive(Clone)]
pub struct TaskRepository {
    kv: Arc<dyn KvStore>,
}

impl TaskRepository {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Missing, unreadable or undecodable data all load as an empty list.
    pub async fn load(&self) -> Vec<Task> {
        let raw = match self.kv.get(TASKS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("cannot read stored tasks, starting empty: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Task>>(&raw) {
            Ok(tasks) => {
                debug!(count = tasks.len(), "loaded tasks");
                tasks
            }
            Err(e) => {
                warn!("cannot decode stored tasks, starting empty: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn save(&self, tasks: &[Task]) -> Result<(), PersistError> {
        let raw = serde_json::to_string(tasks)?;
        self.kv.set(TASKS_KEY, &raw).await
    }

    pub async fn health_check(&self) -> Result<(), PersistError> {
        self.kv.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryKvStore, SqliteKvStore};
    use crate::models::{Priority, TaskStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_tasks() -> Vec<Task> {
        vec![
            Task {
                id: Uuid::new_v4(),
                title: "Pay rent".to_string(),
                description: "Before the 1st".to_string(),
                deadline: "2026-11-01T09:00".to_string(),
                priority: Priority::High,
                category: "personal".to_string(),
                status: TaskStatus::Pending,
                created_at: Utc::now(),
                notified: false,
            },
            Task {
                id: Uuid::new_v4(),
                title: "Ship release".to_string(),
                description: String::new(),
                deadline: "not a date".to_string(),
                priority: Priority::Low,
                category: "work".to_string(),
                status: TaskStatus::Completed,
                created_at: Utc::now(),
                notified: true,
            },
        ]
    }

    #[tokio::test]
    async fn test_load_without_data_is_empty() {
        let repo = TaskRepository::new(Arc::new(MemoryKvStore::new()));
        assert!(repo.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips() {
        let store = SqliteKvStore::in_memory()
            .await
            .expect("Failed to create test db");
        let repo = TaskRepository::new(Arc::new(store));
        let tasks = sample_tasks();

        repo.save(&tasks).await.expect("save");
        assert_eq!(repo.load().await, tasks);

        repo.save(&tasks[..1]).await.expect("save subset");
        assert_eq!(repo.load().await, tasks[..1].to_vec());
    }

    #[tokio::test]
    async fn test_corrupt_data_loads_empty() {
        let kv = Arc::new(MemoryKvStore::new());
        kv.set(TASKS_KEY, "{not json").await.expect("set");

        let repo = TaskRepository::new(kv);
        assert!(repo.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_optional_fields_use_defaults() {
        let kv = Arc::new(MemoryKvStore::new());
        let id = Uuid::new_v4();
        let raw = format!(
            r#"[{{"id":"{id}","title":"Call mom","deadline":"2026-11-01T18:00","createdAt":"2026-10-01T08:00:00Z"}}]"#
        );
        kv.set(TASKS_KEY, &raw).await.expect("set");

        let tasks = TaskRepository::new(kv).load().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, id);
        assert_eq!(tasks[0].status, TaskStatus::Pending);
        assert_eq!(tasks[0].priority, Priority::Medium);
        assert!(!tasks[0].notified);
    }
}
