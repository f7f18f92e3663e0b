//! Lead list and per-lead detail caches
//!
//! The list is scoped to the identity that fetched it; details are scoped by
//! lead id. Saving a list fans every lead out into the detail cache so a
//! detail page opened from the list never needs its own fetch.

use chrono::{DateTime, Duration, Utc};

use super::entry::{EntryInfo, Identity, KeyedCache, ScopedCache};
use super::store::JsonStore;
use crate::clock::SharedClock;
use crate::data::{Lead, LeadStatus};

pub const LEADS_LIST_KEY: &str = "leads-list";
pub const LEAD_DETAILS_KEY: &str = "lead-details";

/// Default time-to-live for the lead list
pub const LIST_TTL_MINUTES: i64 = 5;

/// Default time-to-live for lead details
pub const DETAIL_TTL_MINUTES: i64 = 30;

/// Snapshot of what the lead caches currently hold
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheInfo {
    pub has_list: bool,
    pub list_count: usize,
    pub list_timestamp: Option<DateTime<Utc>>,
    pub has_details: bool,
    pub details_count: usize,
    pub details_timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct LeadCache {
    list: ScopedCache<Vec<Lead>>,
    details: KeyedCache<Lead>,
}

impl LeadCache {
    pub fn new(
        store: JsonStore,
        list_ttl: Duration,
        detail_ttl: Duration,
        clock: SharedClock,
    ) -> Self {
        Self {
            list: ScopedCache::new(store.clone(), LEADS_LIST_KEY, list_ttl, clock.clone()),
            details: KeyedCache::new(store, LEAD_DETAILS_KEY, detail_ttl, clock),
        }
    }

    /// Uses the default 5 minute list and 30 minute detail lifetimes
    pub fn with_defaults(store: JsonStore, clock: SharedClock) -> Self {
        Self::new(
            store,
            Duration::minutes(LIST_TTL_MINUTES),
            Duration::minutes(DETAIL_TTL_MINUTES),
            clock,
        )
    }

    pub fn get_list(&self, identity: &Identity) -> Option<Vec<Lead>> {
        let leads = self.list.get(identity)?;
        tracing::debug!(count = leads.len(), "lead list served from cache");
        Some(leads)
    }

    /// Stores the list for `identity` and refreshes every lead's detail entry
    pub fn save_list(&self, leads: &[Lead], identity: &Identity) {
        self.list.save(leads.to_vec(), identity);
        self.details
            .save_many(leads.iter().map(|lead| (lead.id.clone(), lead.clone())));
    }

    pub fn get_detail(&self, lead_id: &str) -> Option<Lead> {
        self.details.get(lead_id)
    }

    pub fn save_detail(&self, lead_id: &str, lead: &Lead) {
        self.details.save(lead_id, lead.clone());
    }

    /// Applies a status change to the cached copies of a lead
    ///
    /// Both entries keep their identity and timestamp, so an edit never
    /// extends how long a cached copy is served. Returns true if either cache
    /// held the lead.
    pub fn update_status(&self, lead_id: &str, status: LeadStatus) -> bool {
        let apply = |lead: &mut Lead| {
            lead.status = status;
            lead.last_activity = "Just now".to_string();
        };

        let in_list = self.list.update(|leads| {
            match leads.iter_mut().find(|l| l.id == lead_id) {
                Some(lead) => {
                    apply(lead);
                    true
                }
                None => false,
            }
        });
        let in_details = self.details.update(lead_id, apply);
        in_list || in_details
    }

    pub fn info(&self) -> CacheInfo {
        let list = self.list.peek();
        let EntryInfo {
            present,
            count,
            timestamp,
        } = self.details.info();
        CacheInfo {
            has_list: list.is_some(),
            list_count: list.as_ref().map_or(0, |e| e.payload.len()),
            list_timestamp: list.map(|e| e.timestamp),
            has_details: present,
            details_count: count,
            details_timestamp: timestamp,
        }
    }

    pub fn clear_details(&self) {
        self.details.clear();
    }

    pub fn clear_all(&self) {
        self.list.clear();
        self.details.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryStore;
    use crate::clock::{Clock, ManualClock};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn lead(id: &str) -> Lead {
        Lead {
            id: id.to_string(),
            name: format!("Lead {}", id),
            ..Default::default()
        }
    }

    fn setup() -> (LeadCache, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        let cache = LeadCache::with_defaults(JsonStore::new(MemoryStore::new()), Arc::new(clock.clone()));
        (cache, clock)
    }

    fn me() -> Identity {
        Identity::new("EMP1", "emp1@example.com")
    }

    #[test]
    fn test_list_expires_after_ttl() {
        let (cache, clock) = setup();
        cache.save_list(&[lead("a")], &me());

        clock.advance(Duration::minutes(4) + Duration::seconds(59));
        assert_eq!(cache.get_list(&me()).map(|l| l.len()), Some(1));

        clock.advance(Duration::seconds(2));
        assert!(cache.get_list(&me()).is_none());
    }

    #[test]
    fn test_list_scoped_to_identity() {
        let (cache, _clock) = setup();
        cache.save_list(&[lead("a")], &me());

        assert!(cache
            .get_list(&Identity::new("EMP2", "emp1@example.com"))
            .is_none());
    }

    #[test]
    fn test_save_list_fans_out_to_details() {
        let (cache, clock) = setup();
        cache.save_list(&[lead("a"), lead("b")], &me());

        // Details outlive the list
        clock.advance(Duration::minutes(10));
        assert!(cache.get_list(&me()).is_none());
        assert_eq!(cache.get_detail("b").map(|l| l.name), Some("Lead b".to_string()));

        clock.advance(Duration::minutes(21));
        assert!(cache.get_detail("b").is_none());
    }

    #[test]
    fn test_save_detail_single() {
        let (cache, _clock) = setup();
        cache.save_detail("x", &lead("x"));
        assert_eq!(cache.get_detail("x"), Some(lead("x")));
        assert!(cache.get_detail("y").is_none());
    }

    #[test]
    fn test_update_status_touches_list_and_detail() {
        let (cache, _clock) = setup();
        cache.save_list(&[lead("a"), lead("b")], &me());

        assert!(cache.update_status("b", LeadStatus::Qualified));

        let list = cache.get_list(&me()).unwrap();
        let b = list.iter().find(|l| l.id == "b").unwrap();
        assert_eq!(b.status, LeadStatus::Qualified);
        assert_eq!(b.last_activity, "Just now");
        assert_eq!(cache.get_detail("b").unwrap().status, LeadStatus::Qualified);
        assert_eq!(list.iter().find(|l| l.id == "a").unwrap().status, LeadStatus::New);
    }

    #[test]
    fn test_update_status_does_not_revive_expired_list() {
        let (cache, clock) = setup();
        cache.save_list(&[lead("a")], &me());
        let saved_at = clock.now();

        clock.advance(Duration::hours(3));
        cache.update_status("a", LeadStatus::Won);

        assert!(cache.get_list(&me()).is_none());
        assert!(cache.get_detail("a").is_none());

        // A fresh list keeps its original stamp after an edit
        cache.save_list(&[lead("b")], &me());
        let saved_at_fresh = clock.now();
        clock.advance(Duration::minutes(2));
        cache.update_status("b", LeadStatus::Won);
        assert_eq!(cache.info().list_timestamp, Some(saved_at_fresh));
        assert_ne!(saved_at, saved_at_fresh);

        clock.advance(Duration::minutes(4));
        assert!(cache.get_list(&me()).is_none());
    }

    #[test]
    fn test_update_status_unknown_lead() {
        let (cache, _clock) = setup();
        cache.save_list(&[lead("a")], &me());
        assert!(!cache.update_status("zzz", LeadStatus::Won));
    }

    #[test]
    fn test_info_and_clear_all() {
        let (cache, clock) = setup();
        assert_eq!(cache.info(), CacheInfo::default());

        cache.save_list(&[lead("a"), lead("b"), lead("c")], &me());
        let info = cache.info();
        assert!(info.has_list);
        assert_eq!(info.list_count, 3);
        assert_eq!(info.details_count, 3);
        assert_eq!(info.list_timestamp, Some(clock.now()));

        cache.clear_all();
        assert_eq!(cache.info(), CacheInfo::default());
        assert!(cache.get_detail("a").is_none());
    }

    #[test]
    fn test_clear_details_keeps_list() {
        let (cache, _clock) = setup();
        cache.save_list(&[lead("a")], &me());

        cache.clear_details();

        assert!(cache.get_detail("a").is_none());
        assert!(cache.get_list(&me()).is_some());
    }
}
