//! Comments cached per lead

use chrono::Duration;

use super::entry::{EntryInfo, KeyedCache};
use super::store::JsonStore;
use crate::clock::SharedClock;
use crate::data::Comment;

pub const COMMENTS_KEY: &str = "comments";

/// Default time-to-live for a lead's comments
pub const COMMENTS_TTL_MINUTES: i64 = 30;

#[derive(Clone)]
pub struct CommentCache {
    entries: KeyedCache<Vec<Comment>>,
}

impl CommentCache {
    pub fn new(store: JsonStore, ttl: Duration, clock: SharedClock) -> Self {
        Self {
            entries: KeyedCache::new(store, COMMENTS_KEY, ttl, clock),
        }
    }

    pub fn with_defaults(store: JsonStore, clock: SharedClock) -> Self {
        Self::new(store, Duration::minutes(COMMENTS_TTL_MINUTES), clock)
    }

    pub fn get(&self, lead_id: &str) -> Option<Vec<Comment>> {
        self.entries.get(lead_id)
    }

    pub fn save(&self, lead_id: &str, comments: &[Comment]) {
        self.entries.save(lead_id, comments.to_vec());
    }

    pub fn info(&self) -> EntryInfo {
        self.entries.info()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
