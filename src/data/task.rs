//! Tasks and their due-date buckets for the board view

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::lead::parse_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum TaskPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl TaskPriority {
    /// Lenient parse of the backend's priority label
    pub fn from_api(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" | "urgent" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Todo,
    #[serde(rename = "In Progress")]
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn from_api(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "in progress" | "in_progress" | "inprogress" => Self::InProgress,
            "done" | "completed" | "closed" => Self::Done,
            _ => Self::Todo,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "Todo",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work, usually raised against a lead
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub assigned_to: String,
    /// Id of the lead this task was raised against, empty if none
    pub lead_id: String,
}

impl Task {
    pub fn due(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.due_date)
    }
}

/// Board column a task falls into, derived from its due date
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskBucket {
    Today,
    Tomorrow,
    ThisWeek,
    Later,
}

impl TaskBucket {
    pub const ALL: [TaskBucket; 4] = [
        TaskBucket::Today,
        TaskBucket::Tomorrow,
        TaskBucket::ThisWeek,
        TaskBucket::Later,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Today => "Today",
            Self::Tomorrow => "Tomorrow",
            Self::ThisWeek => "This Week",
            Self::Later => "Later",
        }
    }

    /// Buckets a due instant relative to `now`
    ///
    /// Overdue tasks (due before today) belong to no bucket.
    pub fn for_due(due: DateTime<Utc>, now: DateTime<Utc>) -> Option<Self> {
        let today = now.date_naive();
        let tomorrow = today.succ_opt()?;
        let due_day = due.date_naive();
        let end_of_week = now + Duration::days(7);

        if due_day == today {
            Some(Self::Today)
        } else if due_day == tomorrow {
            Some(Self::Tomorrow)
        } else if due_day > tomorrow && due <= end_of_week {
            Some(Self::ThisWeek)
        } else if due > end_of_week {
            Some(Self::Later)
        } else {
            None
        }
    }
}

impl fmt::Display for TaskBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// One board column with its tasks
#[derive(Debug, Clone, PartialEq)]
pub struct TaskColumn {
    pub bucket: TaskBucket,
    pub tasks: Vec<Task>,
}

/// Splits tasks into the four board columns, in column order
///
/// Tasks keep their input order within a column.
pub fn group_tasks(tasks: &[Task], now: DateTime<Utc>) -> Vec<TaskColumn> {
    let mut columns: Vec<TaskColumn> = TaskBucket::ALL
        .iter()
        .map(|&bucket| TaskColumn {
            bucket,
            tasks: Vec::new(),
        })
        .collect();

    for task in tasks {
        let bucket = task.due().and_then(|due| TaskBucket::for_due(due, now));
        if let Some(bucket) = bucket {
            if let Some(column) = columns.iter_mut().find(|c| c.bucket == bucket) {
                column.tasks.push(task.clone());
            }
        }
    }
    columns
}

/// Orders tasks by due date, earliest first; undated tasks go last
pub fn sort_by_due(tasks: &mut [Task]) {
    tasks.sort_by_key(|t| (t.due().is_none(), t.due()));
}
