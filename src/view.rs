use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Task, TaskStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => task.category == *category,
        }
    }
}

impl From<String> for CategoryFilter {
    fn from(value: String) -> Self {
        let value = value.trim();
        if value.is_empty() || value == "all" {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(value.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(TaskStatus),
}

impl StatusFilter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(status) => task.status == *status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status filter: {}", self.0)
    }
}

impl FromStr for StatusFilter {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "all" => Ok(StatusFilter::All),
            "pending" => Ok(StatusFilter::Only(TaskStatus::Pending)),
            "completed" => Ok(StatusFilter::Only(TaskStatus::Completed)),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for StatusFilter {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The two selectors of the list view. Both default to `all`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskFilter {
    #[serde(default, deserialize_with = "category_from_string")]
    pub category: CategoryFilter,
    #[serde(default, deserialize_with = "status_from_string")]
    pub status: StatusFilter,
}

fn category_from_string<'de, D>(deserializer: D) -> Result<CategoryFilter, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(CategoryFilter::from)
}

fn status_from_string<'de, D>(deserializer: D) -> Result<StatusFilter, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    StatusFilter::try_from(raw).map_err(serde::de::Error::custom)
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.category.matches(task) && self.status.matches(task)
    }
}

/// One row of the list view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRow {
    #[serde(flatten)]
    pub task: Task,
    pub overdue: bool,
}

/// Filters `tasks` and orders them by deadline, earliest first.
///
/// The sort is stable: equal deadlines keep insertion order. Tasks whose
/// deadline does not parse go last, also in insertion order.
pub fn derive(tasks: &[Task], filter: &TaskFilter, now: DateTime<Utc>) -> Vec<TaskRow> {
    // parse each deadline once; the position makes the ordering stable
    let mut keyed: Vec<_> = tasks
        .iter()
        .filter(|task| filter.matches(task))
        .enumerate()
        .map(|(position, task)| {
            let deadline = task.deadline_at();
            ((deadline.is_none(), deadline, position), task)
        })
        .collect();

    keyed.sort_unstable_by_key(|(key, _)| *key);
    keyed
        .into_iter()
        .map(|((_, deadline, _), task)| TaskRow {
            task: task.clone(),
            overdue: !task.is_completed() && deadline.is_some_and(|at| at < now),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use chrono::Duration;
    use uuid::Uuid;

    fn task(title: &str, deadline: &str, category: &str, status: TaskStatus) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            deadline: deadline.to_string(),
            priority: Priority::Medium,
            category: category.to_string(),
            status,
            created_at: Utc::now(),
            notified: false,
        }
    }

    fn titles(rows: &[TaskRow]) -> Vec<&str> {
        rows.iter().map(|row| row.task.title.as_str()).collect()
    }

    fn fixture() -> Vec<Task> {
        vec![
            task("c", "2026-10-18T09:00:00Z", "work", TaskStatus::Pending),
            task("broken", "whenever", "work", TaskStatus::Pending),
            task("a", "2026-10-16T09:00:00Z", "personal", TaskStatus::Completed),
            task("b1", "2026-10-17T09:00:00Z", "work", TaskStatus::Completed),
            task("b2", "2026-10-17T11:00:00+02:00", "personal", TaskStatus::Pending),
            task("also-broken", "", "personal", TaskStatus::Pending),
        ]
    }

    #[test]
    fn sorts_by_deadline_stable_with_invalid_last() {
        let rows = derive(&fixture(), &TaskFilter::default(), Utc::now());
        assert_eq!(
            titles(&rows),
            vec!["a", "b1", "b2", "c", "broken", "also-broken"]
        );
    }

    #[test]
    fn filters_combine() {
        let tasks = fixture();
        let now = Utc::now();

        let work = TaskFilter {
            category: CategoryFilter::Only("work".to_string()),
            status: StatusFilter::All,
        };
        assert_eq!(titles(&derive(&tasks, &work, now)), vec!["b1", "c", "broken"]);

        let pending_personal = TaskFilter {
            category: CategoryFilter::Only("personal".to_string()),
            status: StatusFilter::Only(TaskStatus::Pending),
        };
        assert_eq!(
            titles(&derive(&tasks, &pending_personal, now)),
            vec!["b2", "also-broken"]
        );

        let completed = TaskFilter {
            category: CategoryFilter::All,
            status: StatusFilter::Only(TaskStatus::Completed),
        };
        assert_eq!(titles(&derive(&tasks, &completed, now)), vec!["a", "b1"]);
    }

    #[test]
    fn output_is_an_ordered_subset() {
        let tasks = fixture();
        let filter = TaskFilter {
            category: CategoryFilter::All,
            status: StatusFilter::Only(TaskStatus::Pending),
        };
        let rows = derive(&tasks, &filter, Utc::now());

        assert!(rows.iter().all(|row| tasks.contains(&row.task)));
        assert!(rows.iter().all(|row| filter.matches(&row.task)));
        let deadlines: Vec<_> = rows.iter().filter_map(|row| row.task.deadline_at()).collect();
        assert!(deadlines.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn overdue_is_derived_at_now() {
        let now = Utc::now();
        let tasks = vec![
            task("late", &(now - Duration::hours(1)).to_rfc3339(), "work", TaskStatus::Pending),
            task("done", &(now - Duration::hours(1)).to_rfc3339(), "work", TaskStatus::Completed),
            task("future", &(now + Duration::hours(1)).to_rfc3339(), "work", TaskStatus::Pending),
        ];
        let rows = derive(&tasks, &TaskFilter::default(), now);
        let overdue: Vec<_> = rows.iter().map(|row| (row.task.title.as_str(), row.overdue)).collect();
        assert_eq!(overdue, vec![("late", true), ("done", false), ("future", false)]);
    }

    #[test]
    fn filter_parses_from_query_values() {
        let filter: TaskFilter =
            serde_json::from_str(r#"{"category":"work","status":"completed"}"#).expect("parse");
        assert_eq!(filter.category, CategoryFilter::Only("work".to_string()));
        assert_eq!(filter.status, StatusFilter::Only(TaskStatus::Completed));

        let filter: TaskFilter =
            serde_json::from_str(r#"{"category":"all","status":"all"}"#).expect("parse");
        assert_eq!(filter, TaskFilter::default());

        let filter: TaskFilter = serde_json::from_str("{}").expect("parse");
        assert_eq!(filter, TaskFilter::default());

        assert!(serde_json::from_str::<TaskFilter>(r#"{"status":"archived"}"#).is_err());
    }
}
