//! Lead records and pipeline statuses

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pipeline stage of a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Proposal,
    Negotiation,
    Won,
    Lost,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 7] = [
        LeadStatus::New,
        LeadStatus::Contacted,
        LeadStatus::Qualified,
        LeadStatus::Proposal,
        LeadStatus::Negotiation,
        LeadStatus::Won,
        LeadStatus::Lost,
    ];

    /// Maps the backend's status label; unknown labels start the pipeline
    pub fn from_api(label: &str) -> Self {
        match label {
            "New" => Self::New,
            "Contacted" => Self::Contacted,
            "Qualified" => Self::Qualified,
            "Proposal" => Self::Proposal,
            "Negotiation" => Self::Negotiation,
            "Won" | "Client" => Self::Won,
            "Lost" => Self::Lost,
            _ => Self::New,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Proposal => "proposal",
            Self::Negotiation => "negotiation",
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }

    /// Label the backend expects when a status change is pushed
    pub fn api_label(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Contacted => "Contacted",
            Self::Qualified => "Qualified",
            Self::Proposal => "Proposal",
            Self::Negotiation => "Negotiation",
            Self::Won => "Won",
            Self::Lost => "Lost",
        }
    }

    /// Stages counted as converted in the summary
    pub fn is_converted(&self) -> bool {
        matches!(
            self,
            Self::Qualified | Self::Proposal | Self::Negotiation | Self::Won
        )
    }
}

/// Parses the lowercase form used on the command line, ignoring case
impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(Self::New),
            "contacted" => Ok(Self::Contacted),
            "qualified" => Ok(Self::Qualified),
            "proposal" => Ok(Self::Proposal),
            "negotiation" => Ok(Self::Negotiation),
            "won" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            other => Err(format!("unknown lead status '{}'", other)),
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sales prospect as held by the dashboard
///
/// `is_new` and `is_modified` are set by an incremental refresh for a short
/// display window and are never written to the cache.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub status: LeadStatus,
    pub source: String,
    pub value: f64,
    pub created_at: String,
    pub assigned_to: String,
    pub last_activity: String,
    pub industry: String,
    pub notes: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ucc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_done: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nse_cm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nse_cd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bse_fo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcx_co: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nse_fo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bse_cm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_of_employees: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub communication_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_response_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_responded_on: Option<String>,

    #[serde(skip)]
    pub is_new: bool,
    #[serde(skip)]
    pub is_modified: bool,
}

impl Lead {
    /// Parsed creation instant, if the backend sent a readable one
    pub fn created(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }

    pub fn clear_flags(&mut self) {
        self.is_new = false;
        self.is_modified = false;
    }

    pub fn is_flagged(&self) -> bool {
        self.is_new || self.is_modified
    }
}

/// Parses the timestamp formats the backend uses
///
/// Accepts RFC 3339 and `YYYY-MM-DD HH:MM:SS` with optional fraction (read
/// as UTC), and bare dates.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Human "time ago" marker for a backend timestamp
pub fn time_ago(timestamp: &str, now: DateTime<Utc>) -> String {
    let Some(then) = parse_timestamp(timestamp) else {
        return "Recently".to_string();
    };
    let elapsed = now - then;
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{} minutes ago", minutes)
    } else if hours < 24 {
        format!("{} hours ago", hours)
    } else if days == 1 {
        "Yesterday".to_string()
    } else {
        format!("{} days ago", days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_status_from_api_maps_client_to_won() {
        assert_eq!(LeadStatus::from_api("Client"), LeadStatus::Won);
        assert_eq!(LeadStatus::from_api("Qualified"), LeadStatus::Qualified);
    }

    #[test]
    fn test_status_from_api_unknown_defaults_to_new() {
        assert_eq!(LeadStatus::from_api("RNR"), LeadStatus::New);
        assert_eq!(LeadStatus::from_api(""), LeadStatus::New);
    }

    #[test]
    fn test_status_from_str_is_case_insensitive() {
        assert_eq!("WON".parse::<LeadStatus>(), Ok(LeadStatus::Won));
        assert!("maybe".parse::<LeadStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&LeadStatus::Negotiation).unwrap();
        assert_eq!(json, "\"negotiation\"");
    }

    #[test]
    fn test_flags_are_not_persisted() {
        let lead = Lead {
            id: "L1".to_string(),
            is_new: true,
            is_modified: true,
            ..Default::default()
        };

        let json = serde_json::to_string(&lead).unwrap();
        assert!(!json.contains("isNew"));
        assert!(!json.contains("isModified"));

        let back: Lead = serde_json::from_str(&json).unwrap();
        assert!(!back.is_flagged());
    }

    #[test]
    fn test_lead_uses_camel_case_keys() {
        let lead = Lead {
            created_at: "2024-01-01".to_string(),
            assigned_to: "Asha".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&lead).unwrap();
        assert_eq!(json["createdAt"], "2024-01-01");
        assert_eq!(json["assignedTo"], "Asha");
        assert!(json.get("ucc").is_none());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-15 10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-15 10:30:00.123456").map(|d| d.timestamp()), Some(expected.timestamp()));
        assert_eq!(parse_timestamp("2024-01-15T10:30:00Z"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-01-15"),
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_time_ago_buckets() {
        let fmt = |d: Duration| (now() - d).format("%Y-%m-%d %H:%M:%S").to_string();

        assert_eq!(time_ago(&fmt(Duration::seconds(20)), now()), "Just now");
        assert_eq!(time_ago(&fmt(Duration::minutes(5)), now()), "5 minutes ago");
        assert_eq!(time_ago(&fmt(Duration::hours(3)), now()), "3 hours ago");
        assert_eq!(time_ago(&fmt(Duration::hours(30)), now()), "Yesterday");
        assert_eq!(time_ago(&fmt(Duration::days(4)), now()), "4 days ago");
    }

    #[test]
    fn test_time_ago_unparseable() {
        assert_eq!(time_ago("garbage", now()), "Recently");
    }
}
