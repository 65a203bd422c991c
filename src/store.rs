use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::db::TaskRepository;
use crate::error::{AppError, PersistError, ValidationError};
use crate::models::{Task, TaskDraft, TaskStatus, parse_deadline};
use crate::notify::{Notice, Notifier};

/// Whether a new task may carry a deadline that has already passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeadlinePolicy {
    #[default]
    AllowPast,
    RejectPast,
}

impl FromStr for DeadlinePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow-past" | "allow_past" => Ok(DeadlinePolicy::AllowPast),
            "reject-past" | "reject_past" => Ok(DeadlinePolicy::RejectPast),
            other => Err(format!("unknown deadline policy: {other}")),
        }
    }
}

/// Authoritative in-memory task collection.
///
/// Every mutation is saved through the [`TaskRepository`] while the lock is
/// held, so saves land in mutation order. A failed save leaves the in-memory
/// change in place and is reported through the [`Notifier`] once the lock
/// has been released.
pub struct TaskStore {
    tasks: Mutex<Vec<Task>>,
    repository: TaskRepository,
    notifier: Arc<Notifier>,
    policy: DeadlinePolicy,
    snapshot: watch::Sender<Vec<Task>>,
}

impl TaskStore {
    /// Loads the saved collection. Unreadable data starts empty.
    pub async fn open(
        repository: TaskRepository,
        notifier: Arc<Notifier>,
        policy: DeadlinePolicy,
    ) -> Self {
        let tasks = repository.load().await;
        info!(count = tasks.len(), ?policy, "task store opened");
        let (snapshot, _) = watch::channel(tasks.clone());

        Self {
            tasks: Mutex::new(tasks),
            repository,
            notifier,
            policy,
            snapshot,
        }
    }

    /// Validates `draft` and appends it as a pending task.
    ///
    /// Checks run in order: title, deadline presence, deadline format, then
    /// the past-deadline policy. A rejected draft changes nothing.
    pub async fn create(&self, draft: TaskDraft) -> Result<Task, AppError> {
        self.create_at(draft, Utc::now()).await
    }

    pub async fn create_at(&self, draft: TaskDraft, now: DateTime<Utc>) -> Result<Task, AppError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle.into());
        }

        let deadline = draft.deadline.trim();
        if deadline.is_empty() {
            return Err(ValidationError::MissingDeadline.into());
        }
        let deadline_at = parse_deadline(deadline)
            .ok_or_else(|| ValidationError::InvalidDeadline(deadline.to_string()))?;
        if self.policy == DeadlinePolicy::RejectPast && deadline_at < now {
            return Err(ValidationError::PastDeadline.into());
        }

        let task = Task {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: draft.description.trim().to_string(),
            deadline: deadline.to_string(),
            priority: draft.priority,
            category: draft.category.trim().to_string(),
            status: TaskStatus::Pending,
            created_at: now,
            notified: false,
        };

        let saved = {
            let mut tasks = self.tasks.lock().await;
            tasks.push(task.clone());
            self.commit(&tasks).await
        };
        self.report(saved).await;
        debug!(id = %task.id, title = %task.title, "task created");
        Ok(task)
    }

    /// Removes the task if present. Returns whether anything was removed.
    pub async fn delete(&self, id: Uuid) -> bool {
        let (removed, saved) = {
            let mut tasks = self.tasks.lock().await;
            let before = tasks.len();
            tasks.retain(|task| task.id != id);
            (tasks.len() != before, self.commit(&tasks).await)
        };
        self.report(saved).await;
        debug!(%id, removed, "task delete");
        removed
    }

    /// Flips pending/completed. The reminder flag is left alone.
    pub async fn toggle_status(&self, id: Uuid) -> Result<Task, AppError> {
        let (updated, saved) = {
            let mut tasks = self.tasks.lock().await;
            let task = tasks
                .iter_mut()
                .find(|task| task.id == id)
                .ok_or(AppError::NotFound)?;
            task.status = task.status.toggled();
            let updated = task.clone();
            (updated, self.commit(&tasks).await)
        };
        self.report(saved).await;
        debug!(%id, status = updated.status.as_str(), "task toggled");
        Ok(updated)
    }

    /// Snapshot in insertion order.
    pub async fn all(&self) -> Vec<Task> {
        self.tasks.lock().await.clone()
    }

    pub async fn get(&self, id: Uuid) -> Option<Task> {
        self.tasks
            .lock()
            .await
            .iter()
            .find(|task| task.id == id)
            .cloned()
    }

    pub async fn categories(&self) -> Vec<String> {
        self.tasks
            .lock()
            .await
            .iter()
            .filter(|task| !task.category.is_empty())
            .map(|task| task.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Flags every task whose reminder is due at `now` and returns them.
    /// Saves once if anything was flagged.
    pub async fn mark_due_soon(&self, now: DateTime<Utc>, threshold: Duration) -> Vec<Task> {
        let (flagged, saved) = {
            let mut tasks = self.tasks.lock().await;
            let mut flagged = Vec::new();
            for task in tasks.iter_mut() {
                if task.is_due_soon(now, threshold) {
                    task.notified = true;
                    flagged.push(task.clone());
                }
            }

            let saved = if flagged.is_empty() {
                Ok(())
            } else {
                self.commit(&tasks).await
            };
            (flagged, saved)
        };
        self.report(saved).await;
        flagged
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Task>> {
        self.snapshot.subscribe()
    }

    /// Re-sends the current collection to subscribers.
    pub async fn publish(&self) {
        let tasks = self.tasks.lock().await;
        self.snapshot.send_replace(tasks.clone());
    }

    /// Saves the current collection; used on shutdown.
    pub async fn flush(&self) {
        let saved = {
            let tasks = self.tasks.lock().await;
            self.repository.save(&tasks).await
        };
        self.report(saved).await;
    }

    pub fn repository(&self) -> &TaskRepository {
        &self.repository
    }

    async fn commit(&self, tasks: &[Task]) -> Result<(), PersistError> {
        let saved = self.repository.save(tasks).await;
        self.snapshot.send_replace(tasks.to_vec());
        saved
    }

    /// Must be called without the task lock: sinks may do network I/O.
    async fn report(&self, saved: Result<(), PersistError>) {
        if let Err(e) = saved {
            error!("failed to save tasks: {}", e);
            self.notifier
                .notify(Notice::error(format!("Could not save tasks: {e}")))
                .await;
        }
    }
}
