//! Task board: tasks grouped into due-date columns

use chrono::{DateTime, Utc};

use super::fit;
use crate::data::{group_tasks, Task, TaskStatus};

pub fn render(tasks: &[Task], now: DateTime<Utc>) -> Vec<String> {
    let columns = group_tasks(tasks, now);
    let mut lines = Vec::new();
    for column in columns {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(format!("{} ({})", column.bucket, column.tasks.len()));
        for task in &column.tasks {
            lines.push(format!(
                "  [{}] {:<32} {:<6} {:<11} {}",
                if task.status == TaskStatus::Done {
                    'x'
                } else {
                    ' '
                },
                fit(&task.title, 32),
                task.priority.as_str(),
                task.status.as_str(),
                task.due_date,
            ));
        }
    }
    lines
}
