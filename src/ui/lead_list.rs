//! Lead list, summary and cache-info rendering

use chrono::{DateTime, Utc};

use super::{fit, format_value};
use crate::cache::CacheInfo;
use crate::data::Lead;
use crate::query::{LeadSummary, Page};
use crate::refresh::MergeSummary;

const NAME_WIDTH: usize = 24;
const COMPANY_WIDTH: usize = 20;
const STATUS_WIDTH: usize = 12;

/// Marker column: `+` for new leads, `*` for modified ones
fn marker(lead: &Lead) -> char {
    if lead.is_new {
        '+'
    } else if lead.is_modified {
        '*'
    } else {
        ' '
    }
}

fn row(lead: &Lead) -> String {
    format!(
        "{} {:<14} {:<name$} {:<company$} {:<status$} {:>12}  {}",
        marker(lead),
        fit(&lead.id, 14),
        fit(&lead.name, NAME_WIDTH),
        fit(&lead.company, COMPANY_WIDTH),
        lead.status.as_str(),
        format_value(lead.value),
        lead.last_activity,
        name = NAME_WIDTH,
        company = COMPANY_WIDTH,
        status = STATUS_WIDTH,
    )
}

pub fn render_lead_page(page: &Page, per_page: usize) -> Vec<String> {
    if page.matched == 0 {
        return vec!["No leads found.".to_string()];
    }

    let mut lines = vec![format!(
        "  {:<14} {:<name$} {:<company$} {:<status$} {:>12}  {}",
        "ID",
        "NAME",
        "COMPANY",
        "STATUS",
        "VALUE",
        "LAST ACTIVITY",
        name = NAME_WIDTH,
        company = COMPANY_WIDTH,
        status = STATUS_WIDTH,
    )];
    lines.extend(page.leads.iter().map(row));

    let first = page.first_index(per_page);
    let last = first + page.leads.len() - 1;
    lines.push(String::new());
    lines.push(format!(
        "Showing {}-{} of {} leads (page {} of {})",
        first, last, page.matched, page.page, page.total_pages
    ));
    lines
}

pub fn render_summary(summary: &LeadSummary) -> Vec<String> {
    vec![
        format!("Total leads:     {}", summary.total),
        format!("New:             {}", summary.new),
        format!("Contacted:       {}", summary.contacted),
        format!("Qualified:       {}", summary.qualified),
        format!("Pipeline value:  {}", format_value(summary.total_value)),
        format!("Conversion rate: {}%", summary.conversion_rate),
    ]
}

/// One-line report of an auto-refresh merge
pub fn render_merge(summary: &MergeSummary, at: DateTime<Utc>) -> String {
    let time = at.format("%H:%M:%S");
    if summary.has_changes() {
        format!(
            "[{}] {} new, {} updated ({} total)",
            time, summary.new, summary.modified, summary.total
        )
    } else {
        format!("[{}] no changes ({} total)", time, summary.total)
    }
}

pub fn render_cache_info(info: &CacheInfo, now: DateTime<Utc>) -> Vec<String> {
    let age = |ts: Option<DateTime<Utc>>| match ts {
        Some(ts) => format!("{}s old", (now - ts).num_seconds().max(0)),
        None => "-".to_string(),
    };
    vec![
        format!(
            "Lead list:    {} ({} leads, {})",
            if info.has_list { "cached" } else { "empty" },
            info.list_count,
            age(info.list_timestamp)
        ),
        format!(
            "Lead details: {} ({} leads, {})",
            if info.has_details { "cached" } else { "empty" },
            info.details_count,
            age(info.details_timestamp)
        ),
    ]
}
