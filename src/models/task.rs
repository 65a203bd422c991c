use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const LOCAL_DEADLINE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn toggled(self) -> Self {
        match self {
            TaskStatus::Pending => TaskStatus::Completed,
            TaskStatus::Completed => TaskStatus::Pending,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub deadline: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    /// Set once the due-soon reminder has fired. Never cleared.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub notified: bool,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// The deadline as an instant, or `None` when it cannot be parsed.
    pub fn deadline_at(&self) -> Option<DateTime<Utc>> {
        parse_deadline(&self.deadline)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_completed() && self.deadline_at().is_some_and(|deadline| deadline < now)
    }

    /// Whether the reminder should fire at `now`: not completed, not yet
    /// notified, and the deadline lies in `(now, now + threshold]`.
    pub fn is_due_soon(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        if self.is_completed() || self.notified {
            return false;
        }
        self.deadline_at().is_some_and(|deadline| {
            let remaining = deadline - now;
            remaining > Duration::zero() && remaining <= threshold
        })
    }
}

/// Form input for a new task, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub deadline: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: String,
}

/// Accepts RFC 3339 or a local wall-clock date-time such as `2026-10-16T14:30`.
pub fn parse_deadline(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    LOCAL_DEADLINE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        // a wall-clock time skipped by a DST jump has no instant
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn task_with_deadline(deadline: &str) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "Write report".to_string(),
            description: String::new(),
            deadline: deadline.to_string(),
            priority: Priority::High,
            category: "work".to_string(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            notified: false,
        }
    }

    #[test]
    fn parses_rfc3339_deadline() {
        let parsed = parse_deadline("2026-10-16T14:30:00+02:00").expect("rfc3339");
        assert_eq!(parsed.to_rfc3339(), "2026-10-16T12:30:00+00:00");
    }

    #[test]
    fn parses_local_wall_clock_deadline() {
        let local = Local::now()
            .naive_local()
            .with_nanosecond(0)
            .expect("zero nanoseconds is valid");
        let raw = local.format("%Y-%m-%dT%H:%M:%S").to_string();
        let expected = Local
            .from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc));
        assert_eq!(parse_deadline(&raw), expected);

        assert!(parse_deadline("2026-10-16T14:30").is_some());
        assert!(parse_deadline("2026-10-16 14:30").is_some());
    }

    #[test]
    fn rejects_garbage_deadline() {
        assert_eq!(parse_deadline(""), None);
        assert_eq!(parse_deadline("   "), None);
        assert_eq!(parse_deadline("tomorrow-ish"), None);
        assert_eq!(parse_deadline("2026-13-40T99:99"), None);
    }

    #[test]
    fn overdue_ignores_completed_tasks() {
        let past = (Utc::now() - Duration::hours(1)).to_rfc3339();
        let mut task = task_with_deadline(&past);
        assert!(task.is_overdue(Utc::now()));

        task.status = TaskStatus::Completed;
        assert!(!task.is_overdue(Utc::now()));
    }

    #[test]
    fn notified_flag_is_omitted_until_set() {
        let mut task = task_with_deadline("2026-10-16T14:30");
        let json = serde_json::to_value(&task).expect("serialize");
        assert!(json.get("notified").is_none());
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["status"], "pending");
        assert_eq!(json["priority"], "high");

        task.notified = true;
        let json = serde_json::to_value(&task).expect("serialize");
        assert_eq!(json["notified"], true);
    }

    #[test]
    fn due_soon_window_is_open_below_and_closed_above() {
        let now = Utc::now();
        let hour = Duration::hours(1);
        let at = |offset: Duration| task_with_deadline(&(now + offset).to_rfc3339());

        assert!(at(Duration::minutes(30)).is_due_soon(now, hour));
        assert!(at(hour).is_due_soon(now, hour));
        assert!(!at(Duration::zero()).is_due_soon(now, hour));
        assert!(!at(Duration::minutes(-5)).is_due_soon(now, hour));
        assert!(!at(Duration::hours(2)).is_due_soon(now, hour));
        assert!(!task_with_deadline("someday").is_due_soon(now, hour));

        let mut done = at(Duration::minutes(30));
        done.status = TaskStatus::Completed;
        assert!(!done.is_due_soon(now, hour));

        let mut flagged = at(Duration::minutes(30));
        flagged.notified = true;
        assert!(!flagged.is_due_soon(now, hour));
    }

    #[test]
    fn toggled_status_is_an_involution() {
        assert_eq!(TaskStatus::Pending.toggled(), TaskStatus::Completed);
        assert_eq!(TaskStatus::Pending.toggled().toggled(), TaskStatus::Pending);
    }
}
