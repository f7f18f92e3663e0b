//! Single-lead view with its comment thread

use chrono::{DateTime, Utc};

use super::format_value;
use crate::data::{time_ago, Comment, Lead};

fn field(lines: &mut Vec<String>, label: &str, value: &str) {
    if !value.is_empty() {
        lines.push(format!("  {:<16} {}", label, value));
    }
}

pub fn render(lead: &Lead, comments: Option<&[Comment]>, now: DateTime<Utc>) -> Vec<String> {
    let mut lines = vec![format!("{} ({})", lead.name, lead.id), String::new()];

    field(&mut lines, "Status", lead.status.as_str());
    field(&mut lines, "Company", &lead.company);
    field(&mut lines, "Email", &lead.email);
    field(&mut lines, "Phone", &lead.phone);
    field(&mut lines, "Source", &lead.source);
    field(&mut lines, "Value", &format_value(lead.value));
    field(&mut lines, "Assigned to", &lead.assigned_to);
    field(&mut lines, "Created", &lead.created_at);
    field(&mut lines, "Last activity", &lead.last_activity);
    for (label, value) in [
        ("City", &lead.city),
        ("State", &lead.state),
        ("UCC", &lead.ucc),
        ("Referred by", &lead.referred_by),
        ("Branch", &lead.branch_code),
        ("Trade done", &lead.trade_done),
    ] {
        if let Some(value) = value {
            field(&mut lines, label, value);
        }
    }
    if !lead.notes.is_empty() {
        lines.push(String::new());
        lines.push(format!("  {}", lead.notes));
    }

    let Some(comments) = comments else {
        return lines;
    };
    lines.push(String::new());
    if comments.is_empty() {
        lines.push("No comments yet.".to_string());
        return lines;
    }
    lines.push(format!("Comments ({})", comments.len()));
    for comment in comments {
        lines.push(format!(
            "  {} · {}",
            comment.author,
            time_ago(&comment.created_at, now)
        ));
        lines.push(format!("    {}", comment.content));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_skips_empty_fields() {
        let lead = Lead {
            id: "CRM-LEAD-1".to_string(),
            name: "Ravi".to_string(),
            city: Some("Pune".to_string()),
            ..Default::default()
        };

        let lines = render(&lead, None, now());

        assert_eq!(lines[0], "Ravi (CRM-LEAD-1)");
        assert!(lines.iter().any(|l| l.contains("City") && l.contains("Pune")));
        assert!(!lines.iter().any(|l| l.contains("Email")));
    }

    #[test]
    fn test_renders_comments() {
        let lead = Lead::default();
        let comments = vec![Comment {
            content: "Called, will revert".to_string(),
            author: "meera@gopocket.in".to_string(),
            created_at: "2024-06-01 10:00:00".to_string(),
            ..Default::default()
        }];

        let lines = render(&lead, Some(&comments), now());

        assert!(lines.contains(&"Comments (1)".to_string()));
        assert!(lines.contains(&"  meera@gopocket.in · 2 hours ago".to_string()));
        assert!(lines.contains(&"    Called, will revert".to_string()));
    }

    #[test]
    fn test_empty_comment_thread() {
        let lines = render(&Lead::default(), Some(&[]), now());
        assert_eq!(lines.last().unwrap(), "No comments yet.");
    }
}
