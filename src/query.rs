//! Filtering, sorting and paging of an in-memory lead list

use std::cmp::Ordering;
use std::str::FromStr;

use crate::data::{Lead, LeadStatus};

/// Default number of leads per page
pub const DEFAULT_PER_PAGE: usize = 25;

/// Column a lead list can be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Status,
    Value,
    CreatedAt,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "status" => Ok(Self::Status),
            "value" => Ok(Self::Value),
            "created" | "created_at" | "createdat" => Ok(Self::CreatedAt),
            other => Err(format!(
                "unknown sort key '{}', expected name, status, value or created",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl Direction {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

/// A view over a lead list: search, status filter, sort and page
#[derive(Debug, Clone, PartialEq)]
pub struct LeadQuery {
    pub search: Option<String>,
    pub status: Option<LeadStatus>,
    pub sort: Option<(SortKey, Direction)>,
    /// 1-based; clamped into range when applied
    pub page: usize,
    pub per_page: usize,
}

impl Default for LeadQuery {
    fn default() -> Self {
        Self {
            search: None,
            status: None,
            sort: Some((SortKey::CreatedAt, Direction::Desc)),
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// One page of a filtered, sorted list
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub leads: Vec<Lead>,
    /// Page actually shown after clamping
    pub page: usize,
    pub total_pages: usize,
    /// Leads matching the filters, across all pages
    pub matched: usize,
}

impl Page {
    /// 1-based index of the first lead on this page, 0 when empty
    pub fn first_index(&self, per_page: usize) -> usize {
        if self.leads.is_empty() {
            0
        } else {
            (self.page - 1) * per_page + 1
        }
    }
}

impl LeadQuery {
    fn matches(&self, lead: &Lead) -> bool {
        if let Some(status) = self.status {
            if lead.status != status {
                return false;
            }
        }
        let Some(term) = self.search.as_deref().map(str::to_lowercase) else {
            return true;
        };
        if term.is_empty() {
            return true;
        }
        let hit = |field: &str| field.to_lowercase().contains(&term);
        hit(&lead.name)
            || hit(&lead.company)
            || hit(&lead.email)
            || hit(&lead.phone)
            || lead.city.as_deref().is_some_and(hit)
            || hit(&lead.source)
    }

    /// Leads matching the search and status filter, sorted
    pub fn filter(&self, leads: &[Lead]) -> Vec<Lead> {
        let mut result: Vec<Lead> = leads.iter().filter(|l| self.matches(l)).cloned().collect();
        if let Some((key, direction)) = self.sort {
            result.sort_by(|a, b| compare(key, direction, a, b));
        }
        result
    }

    pub fn apply(&self, leads: &[Lead]) -> Page {
        let filtered = self.filter(leads);
        let per_page = self.per_page.max(1);
        let matched = filtered.len();
        let total_pages = matched.div_ceil(per_page);
        let page = self.page.clamp(1, total_pages.max(1));
        let leads = filtered
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();
        Page {
            leads,
            page,
            total_pages,
            matched,
        }
    }
}

/// Orders two leads by `key` in `direction`
///
/// Leads without a readable creation time go last in either direction.
fn compare(key: SortKey, direction: Direction, a: &Lead, b: &Lead) -> Ordering {
    match key {
        SortKey::Name => direction.apply(a.name.cmp(&b.name)),
        SortKey::Status => direction.apply(a.status.as_str().cmp(b.status.as_str())),
        SortKey::Value => direction.apply(a.value.total_cmp(&b.value)),
        SortKey::CreatedAt => {
            let a = a.created().map(|t| t.timestamp_millis());
            let b = b.created().map(|t| t.timestamp_millis());
            match (a, b) {
                (Some(a), Some(b)) => direction.apply(a.cmp(&b)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }
    }
}

/// Headline numbers for a lead list
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LeadSummary {
    pub total: usize,
    pub new: usize,
    pub contacted: usize,
    pub qualified: usize,
    pub total_value: f64,
    /// Whole percent of leads at qualified or beyond (won included)
    pub conversion_rate: u32,
}

impl LeadSummary {
    pub fn from_leads(leads: &[Lead]) -> Self {
        let count = |status: LeadStatus| leads.iter().filter(|l| l.status == status).count();
        let converted = leads.iter().filter(|l| l.status.is_converted()).count();
        let rate = 100.0 * converted as f64 / leads.len().max(1) as f64;
        Self {
            total: leads.len(),
            new: count(LeadStatus::New),
            contacted: count(LeadStatus::Contacted),
            qualified: count(LeadStatus::Qualified),
            total_value: leads.iter().map(|l| l.value).sum(),
            conversion_rate: rate.round() as u32,
        }
    }
}
