//! Full task list cached per identity

use chrono::Duration;

use super::entry::{Identity, ScopedCache};
use super::store::JsonStore;
use crate::clock::SharedClock;
use crate::data::Task;

pub const TASKS_KEY: &str = "tasks";

/// Default time-to-live for the task list
pub const TASKS_TTL_MINUTES: i64 = 5;

#[derive(Clone)]
pub struct TaskCache {
    entry: ScopedCache<Vec<Task>>,
}

impl TaskCache {
    pub fn new(store: JsonStore, ttl: Duration, clock: SharedClock) -> Self {
        Self {
            entry: ScopedCache::new(store, TASKS_KEY, ttl, clock),
        }
    }

    pub fn with_defaults(store: JsonStore, clock: SharedClock) -> Self {
        Self::new(store, Duration::minutes(TASKS_TTL_MINUTES), clock)
    }

    pub fn get(&self, identity: &Identity) -> Option<Vec<Task>> {
        self.entry.get(identity)
    }

    pub fn save(&self, tasks: &[Task], identity: &Identity) {
        self.entry.save(tasks.to_vec(), identity);
    }

    /// Number of cached tasks, ignoring expiry and identity
    pub fn cached_count(&self) -> Option<usize> {
        self.entry.peek().map(|e| e.payload.len())
    }

    pub fn clear(&self) {
        self.entry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryStore;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    #[test]
    fn test_tasks_scoped_and_cleared() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        let cache = TaskCache::with_defaults(JsonStore::new(MemoryStore::new()), Arc::new(clock.clone()));
        let me = Identity::new("EMP1", "emp1@example.com");
        let task = Task {
            id: "TASK-1".to_string(),
            ..Default::default()
        };

        cache.save(&[task.clone()], &me);
        assert_eq!(cache.get(&me), Some(vec![task]));
        assert!(cache.get(&Identity::new("EMP9", "x@example.com")).is_none());

        // The mismatched read invalidated the entry
        assert_eq!(cache.cached_count(), None);

        cache.save(&[], &me);
        cache.clear();
        assert!(cache.get(&me).is_none());
    }

    #[test]
    fn test_tasks_expire() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        let cache = TaskCache::with_defaults(JsonStore::new(MemoryStore::new()), Arc::new(clock.clone()));
        let me = Identity::new("EMP1", "emp1@example.com");

        cache.save(&[], &me);
        clock.advance(Duration::minutes(TASKS_TTL_MINUTES));

        assert!(cache.get(&me).is_none());
    }
}
