//! Incremental merge of a refreshed lead list
//!
//! An auto refresh compares the incoming batch against the last list the
//! view held. Records are classified by a content fingerprint over the
//! fields a user actually looks at; unchanged records keep the previous
//! copy so the view does not churn.

use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::time::Duration;

use crate::data::Lead;

/// How long new/modified highlights stay visible after a merge
pub const FLAG_DISPLAY_WINDOW: Duration = Duration::from_secs(5);

/// Fingerprint of the fields whose change counts as a modification
///
/// Fields are joined with `|` in a fixed order: name, email, phone,
/// company, status, value, assigned to, last activity.
pub fn fingerprint(lead: &Lead) -> String {
    let value = lead.value.to_string();
    [
        lead.name.as_str(),
        lead.email.as_str(),
        lead.phone.as_str(),
        lead.company.as_str(),
        lead.status.as_str(),
        value.as_str(),
        lead.assigned_to.as_str(),
        lead.last_activity.as_str(),
    ]
    .join("|")
}

/// Counts reported by a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub new: usize,
    pub modified: usize,
    pub total: usize,
}

impl MergeSummary {
    pub fn has_changes(&self) -> bool {
        self.new > 0 || self.modified > 0
    }
}

/// Result of merging an incoming batch into the previous list
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    /// Incoming ids, flagged, newest first
    pub leads: Vec<Lead>,
    pub summary: MergeSummary,
}

/// Merges `incoming` into `previous`, flagging new and modified leads
///
/// The result holds exactly the incoming ids. Leads that vanished upstream
/// are dropped. Unchanged leads are the previous copies with flags cleared.
pub fn merge_incremental(previous: &[Lead], incoming: Vec<Lead>) -> Merged {
    let previous_by_id: HashMap<&str, (&Lead, String)> = previous
        .iter()
        .map(|lead| (lead.id.as_str(), (lead, fingerprint(lead))))
        .collect();

    let mut summary = MergeSummary::default();
    let mut leads = Vec::with_capacity(incoming.len());

    for mut lead in incoming {
        match previous_by_id.get(lead.id.as_str()) {
            None => {
                tracing::debug!(id = %lead.id, "new lead");
                lead.is_new = true;
                lead.is_modified = false;
                summary.new += 1;
                leads.push(lead);
            }
            Some((_, old_fingerprint)) if *old_fingerprint != fingerprint(&lead) => {
                tracing::debug!(id = %lead.id, "modified lead");
                lead.is_new = false;
                lead.is_modified = true;
                summary.modified += 1;
                leads.push(lead);
            }
            Some((existing, _)) => {
                let mut kept = (*existing).clone();
                kept.clear_flags();
                leads.push(kept);
            }
        }
    }

    sort_newest_first(&mut leads);
    summary.total = leads.len();
    Merged { leads, summary }
}

/// Full replace used by initial and manual loads: sorted, no flags
pub fn full_replace(mut incoming: Vec<Lead>) -> Vec<Lead> {
    incoming.iter_mut().for_each(Lead::clear_flags);
    sort_newest_first(&mut incoming);
    incoming
}

/// Sorts by creation time, newest first; unreadable timestamps go last
///
/// The sort is stable, so leads created at the same instant keep their
/// relative order.
pub fn sort_newest_first(leads: &mut [Lead]) {
    leads.sort_by_key(|lead| Reverse(lead.created().map(|t: DateTime<Utc>| t.timestamp_millis())));
}

/// Clears every highlight; returns true if any flag was set
pub fn clear_flags(leads: &mut [Lead]) -> bool {
    let mut cleared = false;
    for lead in leads.iter_mut().filter(|l| l.is_flagged()) {
        lead.clear_flags();
        cleared = true;
    }
    cleared
}
