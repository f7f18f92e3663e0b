//! Serde-deserializable types matching the webhook's records.
//!
//! The backend is loose about types: strings arrive as numbers, numbers as
//! strings, and any field may be null or missing. These types accept all of
//! that and the `into_*` methods resolve every gap to a fixed default, so the
//! domain types never carry a half-filled record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::data::{time_ago, Comment, Lead, LeadStatus, Task, TaskPriority, TaskStatus};

// ============================================================================
// Lenient field decoding
// ============================================================================

/// Reads a string, number or bool as a trimmed string; null and empty become None
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Reads a number or a numeric string; anything else becomes None
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn or(value: Option<String>, fallback: &str) -> String {
    value.unwrap_or_else(|| fallback.to_string())
}

// ============================================================================
// Leads
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiLead {
    #[serde(deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub lead_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub first_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub mobile_no: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub lead_source: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub lead_owner: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub assigned: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub annual_revenue: Option<f64>,
    #[serde(deserialize_with = "lenient_string")]
    pub creation: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub modified: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub issue: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub ucc: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub referredby: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub city: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub state: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub pannumber: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub branch_code: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub tradedone: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub nse_cm: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub nse_cd: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub bse_fo: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub mcx_co: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub nse_fo: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub bse_cm: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub no_of_employees: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub communication_status: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub first_response_time: Option<f64>,
    #[serde(deserialize_with = "lenient_string")]
    pub first_responded_on: Option<String>,
}

impl ApiLead {
    /// Maps to the domain lead; `now` anchors the last-activity marker
    pub fn into_lead(self, now: DateTime<Utc>) -> Lead {
        let last_activity = time_ago(self.modified.as_deref().unwrap_or_default(), now);
        Lead {
            id: self.name.unwrap_or_default(),
            name: self
                .lead_name
                .or(self.first_name)
                .unwrap_or_else(|| "Unknown".to_string()),
            email: or(self.email, "No email"),
            phone: or(self.mobile_no, "No phone"),
            company: self
                .city
                .clone()
                .or_else(|| self.lead_source.clone())
                .unwrap_or_else(|| "Unknown Company".to_string()),
            status: LeadStatus::from_api(self.status.as_deref().unwrap_or_default()),
            source: or(self.lead_source.clone(), "Unknown"),
            value: self.annual_revenue.unwrap_or(0.0),
            created_at: self.creation.unwrap_or_default(),
            assigned_to: self
                .assigned
                .or(self.lead_owner)
                .unwrap_or_else(|| "Unassigned".to_string()),
            last_activity,
            industry: or(self.lead_source, "General"),
            notes: or(self.issue, "No notes available"),
            ucc: self.ucc,
            referred_by: self.referredby,
            city: self.city,
            state: self.state,
            pan_number: self.pannumber,
            branch_code: self.branch_code,
            trade_done: self.tradedone,
            nse_cm: self.nse_cm,
            nse_cd: self.nse_cd,
            bse_fo: self.bse_fo,
            mcx_co: self.mcx_co,
            nse_fo: self.nse_fo,
            bse_cm: self.bse_cm,
            no_of_employees: self.no_of_employees,
            communication_status: self.communication_status,
            first_response_time: self.first_response_time,
            first_responded_on: self.first_responded_on,
            is_new: false,
            is_modified: false,
        }
    }
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiTask {
    #[serde(deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub due_date: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub priority: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub assigned_to: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub reference_docname: Option<String>,
}

impl ApiTask {
    pub fn into_task(self) -> Task {
        Task {
            id: self.name.unwrap_or_default(),
            title: or(self.title, "Untitled task"),
            description: self.description.map(strip_paragraph).unwrap_or_default(),
            due_date: self.due_date.unwrap_or_default(),
            priority: TaskPriority::from_api(self.priority.as_deref().unwrap_or_default()),
            status: TaskStatus::from_api(self.status.as_deref().unwrap_or_default()),
            assigned_to: or(self.assigned_to, "Unassigned"),
            lead_id: self.reference_docname.unwrap_or_default(),
        }
    }
}

/// Task descriptions are stored as a single HTML paragraph
fn strip_paragraph(s: String) -> String {
    match s.strip_prefix("<p>").and_then(|s| s.strip_suffix("</p>")) {
        Some(inner) => inner.to_string(),
        None => s,
    }
}

// ============================================================================
// Comments
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiComment {
    #[serde(deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub reference_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub content: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub comment_by: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub owner: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub creation: Option<String>,
}

impl ApiComment {
    /// Maps to the domain comment; `lead_id` fills in a missing reference
    pub fn into_comment(self, lead_id: &str) -> Comment {
        Comment {
            id: self.name.unwrap_or_default(),
            lead_id: self.reference_name.unwrap_or_else(|| lead_id.to_string()),
            content: self.content.map(strip_paragraph).unwrap_or_default(),
            author: self
                .comment_by
                .or(self.owner)
                .unwrap_or_else(|| "Unknown".to_string()),
            created_at: self.creation.unwrap_or_default(),
        }
    }
}
