use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::Task;
use crate::notify::{Notice, Notifier};
use crate::store::TaskStore;

/// Periodic due-soon check.
///
/// Each tick flags the pending tasks whose deadline falls within
/// `threshold`, emits one notice per flagged task and re-publishes the task
/// list. A task is flagged at most once. Ticks missed while the process was
/// suspended are skipped, not replayed.
pub struct ReminderScheduler {
    store: Arc<TaskStore>,
    notifier: Arc<Notifier>,
    interval: Duration,
    threshold: chrono::Duration,
    cancel: CancellationToken,
}

/// Running scheduler. Dropping it leaves the loop running; call [`stop`](Self::stop).
pub struct SchedulerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            warn!("reminder scheduler ended abnormally: {:?}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl ReminderScheduler {
    /// `interval` is the time between checks; a task is reminded once its
    /// deadline is at most `threshold` away.
    pub fn new(
        store: Arc<TaskStore>,
        notifier: Arc<Notifier>,
        interval: Duration,
        threshold: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            interval,
            threshold: chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::hours(1)),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token, e.g. a child of the process shutdown token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn spawn(self) -> SchedulerHandle {
        let cancel = self.cancel.clone();
        let join = tokio::spawn(self.run());
        SchedulerHandle { cancel, join }
    }

    /// Runs until cancelled. The first check happens immediately.
    pub async fn run(self) {
        info!(
            "Starting reminder scheduler (interval: {:?}, threshold: {})",
            self.interval, self.threshold
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("reminder scheduler stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    pub async fn tick(&self) -> Vec<Uuid> {
        self.tick_at(Utc::now()).await
    }

    /// One check at a fixed instant. Returns the ids that were flagged.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        let flagged = self.store.mark_due_soon(now, self.threshold).await;
        if !flagged.is_empty() {
            info!(count = flagged.len(), "reminders due");
        }

        for task in &flagged {
            debug!(id = %task.id, title = %task.title, "sending reminder");
            self.notifier
                .notify(Notice::info(reminder_message(task, self.threshold)))
                .await;
        }

        self.store.publish().await;
        flagged.into_iter().map(|task| task.id).collect()
    }
}

fn reminder_message(task: &Task, threshold: chrono::Duration) -> String {
    let window = match threshold.num_minutes() {
        60 => "an hour".to_string(),
        m if m > 0 && m % 60 == 0 => format!("{} hours", m / 60),
        1 => "a minute".to_string(),
        m if m > 0 => format!("{m} minutes"),
        _ => format!("{} seconds", threshold.num_seconds()),
    };
    format!("Task \"{}\" is due in less than {}!", task.title, window)
}
