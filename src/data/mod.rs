//! Core data models for the lead dashboard
//!
//! Leads, tasks and comments as the application holds them, after mapping
//! from the webhook's loosely-typed records (see `crate::api::types`).

pub mod comment;
pub mod lead;
pub mod task;

pub use comment::Comment;
pub use lead::{parse_timestamp, time_ago, Lead, LeadStatus};
pub use task::{group_tasks, sort_by_due, Task, TaskBucket, TaskColumn, TaskPriority, TaskStatus};
