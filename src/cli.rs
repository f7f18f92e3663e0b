//! Command-line interface parsing for leadsync
//!
//! This module defines the clap command tree and the value parsers for the
//! arguments clap cannot parse on its own (statuses, intervals, due dates).

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

use crate::cache::Identity;
use crate::data::{parse_timestamp, LeadStatus, TaskPriority, TaskStatus};
use crate::query::{Direction, LeadQuery, SortKey};
use crate::refresh::RefreshInterval;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid status: '{0}'. Valid statuses: new, contacted, qualified, proposal, negotiation, won, lost")]
    InvalidStatus(String),

    #[error("Invalid priority: '{0}'. Valid priorities: high, medium, low")]
    InvalidPriority(String),

    #[error("Invalid task status: '{0}'. Valid statuses: todo, in-progress, done")]
    InvalidTaskStatus(String),

    #[error("Invalid due date: '{0}'. Use YYYY-MM-DD or YYYY-MM-DD HH:MM:SS")]
    InvalidDue(String),

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),
}

/// leadsync - cached CRM lead lists with incremental refresh
#[derive(Parser, Debug)]
#[command(name = "leadsync")]
#[command(about = "Headless CRM lead dashboard with caching and incremental refresh")]
#[command(version)]
pub struct Cli {
    /// Path to a YAML config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Act as this employee instead of the signed-in session
    #[arg(long, global = true, requires = "email", value_name = "ID")]
    pub employee_id: Option<String>,

    /// Email paired with --employee-id
    #[arg(long, global = true, requires = "employee_id")]
    pub email: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in to the HRMS service
    Login {
        #[arg(value_name = "EMPLOYEE_ID")]
        user: String,
        /// Password; read from LEADSYNC_PASSWORD when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign out and clear the stored session
    Logout,
    /// List leads, from cache when fresh
    Leads(LeadsArgs),
    /// Show one lead with its comments
    Lead { id: String },
    /// Force a refresh of the lead list (rate limited)
    Refresh,
    /// Keep the lead list fresh and report what changed
    Watch {
        /// Seconds between refreshes (60-900)
        #[arg(long, value_parser = parse_interval)]
        interval: Option<RefreshInterval>,
    },
    /// Headline numbers for leads and tasks
    Summary,
    /// Show tasks grouped by when they are due
    Tasks,
    /// List comments on a lead
    Comments { lead_id: String },
    /// Change a lead's status
    Status {
        lead_id: String,
        #[arg(value_parser = parse_status)]
        status: LeadStatus,
    },
    /// Assign leads to someone
    Assign {
        /// Assignee email
        #[arg(long)]
        to: String,
        #[arg(required = true)]
        lead_ids: Vec<String>,
    },
    /// Create a task on a lead
    AddTask(AddTaskArgs),
    /// Move a task to another status
    TaskStatus {
        task_id: String,
        lead_id: String,
        #[arg(value_parser = parse_task_status)]
        status: TaskStatus,
    },
    /// Inspect or clear the local cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Args, Debug, Clone)]
pub struct LeadsArgs {
    /// Skip the cache and fetch from the server
    #[arg(long)]
    pub refresh: bool,

    /// Case-insensitive search over name, company, email, phone, city and source
    #[arg(short, long)]
    pub search: Option<String>,

    #[arg(long, value_parser = parse_status)]
    pub status: Option<LeadStatus>,

    /// Sort by name, status, value or created
    #[arg(long, default_value = "created")]
    pub sort: SortKey,

    /// Sort ascending instead of descending
    #[arg(long)]
    pub asc: bool,

    #[arg(long, default_value_t = 1)]
    pub page: usize,

    #[arg(long, default_value_t = crate::query::DEFAULT_PER_PAGE)]
    pub per_page: usize,
}

impl LeadsArgs {
    pub fn query(&self) -> LeadQuery {
        let direction = if self.asc {
            Direction::Asc
        } else {
            Direction::Desc
        };
        LeadQuery {
            search: self.search.clone(),
            status: self.status,
            sort: Some((self.sort, direction)),
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AddTaskArgs {
    pub lead_id: String,

    #[arg(long)]
    pub title: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Due date, YYYY-MM-DD or YYYY-MM-DD HH:MM:SS (UTC)
    #[arg(long, value_parser = parse_due)]
    pub due: DateTime<Utc>,

    #[arg(long, default_value = "medium", value_parser = parse_priority)]
    pub priority: TaskPriority,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Show what the cache holds
    Info,
    /// Remove cached data
    Clear {
        /// Only drop per-lead details
        #[arg(long)]
        details_only: bool,
    },
}

impl Cli {
    /// Identity given on the command line, if both parts were provided
    pub fn identity_override(&self) -> Option<Identity> {
        match (&self.employee_id, &self.email) {
            (Some(id), Some(email)) => Some(Identity::new(id, email)),
            _ => None,
        }
    }
}

pub fn parse_status(s: &str) -> Result<LeadStatus, CliError> {
    s.parse::<LeadStatus>()
        .map_err(|_| CliError::InvalidStatus(s.to_string()))
}

pub fn parse_priority(s: &str) -> Result<TaskPriority, CliError> {
    match s.to_lowercase().as_str() {
        "high" => Ok(TaskPriority::High),
        "medium" => Ok(TaskPriority::Medium),
        "low" => Ok(TaskPriority::Low),
        _ => Err(CliError::InvalidPriority(s.to_string())),
    }
}

pub fn parse_task_status(s: &str) -> Result<TaskStatus, CliError> {
    match s.to_lowercase().replace(['-', '_'], " ").as_str() {
        "todo" | "to do" => Ok(TaskStatus::Todo),
        "in progress" => Ok(TaskStatus::InProgress),
        "done" => Ok(TaskStatus::Done),
        _ => Err(CliError::InvalidTaskStatus(s.to_string())),
    }
}

pub fn parse_due(s: &str) -> Result<DateTime<Utc>, CliError> {
    parse_timestamp(s).ok_or_else(|| CliError::InvalidDue(s.to_string()))
}

pub fn parse_interval(s: &str) -> Result<RefreshInterval, CliError> {
    let secs: u64 = s
        .parse()
        .map_err(|_| CliError::InvalidInterval(format!("'{}' is not a number of seconds", s)))?;
    RefreshInterval::from_secs(secs).map_err(|e| CliError::InvalidInterval(e.to_string()))
}
