//! Timestamped cache entries and the two cache shapes built from them
//!
//! `ScopedCache` holds a single payload that belongs to one requesting
//! identity. `KeyedCache` holds a map of payloads keyed by record id, each
//! with its own timestamp. Both treat an expired or foreign entry exactly
//! like a missing one and delete it on the way out.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use super::store::JsonStore;
use crate::clock::SharedClock;

/// The user a cached payload was fetched for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "employeeId")]
    pub employee_id: String,
    pub email: String,
}

impl Identity {
    pub fn new(employee_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            employee_id: employee_id.into(),
            email: email.into(),
        }
    }

    /// Both halves are required before anything is fetched for this identity
    pub fn is_complete(&self) -> bool {
        !self.employee_id.is_empty() && !self.email.is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.employee_id, self.email)
    }
}

/// Payload scoped to an identity, as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopedEntry<T> {
    pub payload: T,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub identity: Identity,
}

/// Payload with its own creation instant, as persisted inside a keyed map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stamped<T> {
    pub payload: T,
    pub timestamp: DateTime<Utc>,
}

/// Whether an entry created at `timestamp` is still fresh at `now`
pub fn is_fresh(timestamp: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    now - timestamp < ttl
}

/// Presence and age of a cached blob
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryInfo {
    pub present: bool,
    pub count: usize,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Single identity-scoped payload stored under one key
pub struct ScopedCache<T> {
    store: JsonStore,
    key: &'static str,
    ttl: Duration,
    clock: SharedClock,
    _payload: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> ScopedCache<T> {
    pub fn new(store: JsonStore, key: &'static str, ttl: Duration, clock: SharedClock) -> Self {
        Self {
            store,
            key,
            ttl,
            clock,
            _payload: PhantomData,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the payload if it belongs to `identity` and has not expired
    pub fn get(&self, identity: &Identity) -> Option<T> {
        let entry: ScopedEntry<T> = self.store.read(self.key)?;
        let fresh = is_fresh(entry.timestamp, self.clock.now(), self.ttl);
        if !fresh || entry.identity != *identity {
            tracing::debug!(key = self.key, fresh, "dropping cache entry");
            self.store.delete(self.key);
            return None;
        }
        Some(entry.payload)
    }

    /// Stores `payload` for `identity`, stamped with the current instant
    pub fn save(&self, payload: T, identity: &Identity) {
        let entry = ScopedEntry {
            payload,
            timestamp: self.clock.now(),
            identity: identity.clone(),
        };
        self.store.write(self.key, &entry);
    }

    /// Rewrites the stored payload in place, keeping its timestamp and identity
    ///
    /// `f` returns whether it changed anything; nothing is written otherwise.
    pub fn update(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        let Some(mut entry) = self.peek() else {
            return false;
        };
        if !f(&mut entry.payload) {
            return false;
        }
        self.store.write(self.key, &entry);
        true
    }

    /// Reads the raw entry without checking expiry or identity
    pub fn peek(&self) -> Option<ScopedEntry<T>> {
        self.store.read(self.key)
    }

    pub fn clear(&self) {
        self.store.delete(self.key);
    }
}

impl<T> Clone for ScopedCache<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            key: self.key,
            ttl: self.ttl,
            clock: self.clock.clone(),
            _payload: PhantomData,
        }
    }
}

/// Map of per-record payloads stored under one key
pub struct KeyedCache<T> {
    store: JsonStore,
    key: &'static str,
    ttl: Duration,
    clock: SharedClock,
    _payload: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> KeyedCache<T> {
    pub fn new(store: JsonStore, key: &'static str, ttl: Duration, clock: SharedClock) -> Self {
        Self {
            store,
            key,
            ttl,
            clock,
            _payload: PhantomData,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn load(&self) -> BTreeMap<String, Stamped<T>> {
        self.store.read(self.key).unwrap_or_default()
    }

    /// Returns the payload for `id` unless it has expired
    pub fn get(&self, id: &str) -> Option<T> {
        let mut entries = self.load();
        let entry = entries.get(id)?;
        if is_fresh(entry.timestamp, self.clock.now(), self.ttl) {
            return entries.remove(id).map(|e| e.payload);
        }
        tracing::debug!(key = self.key, id, "dropping expired cache entry");
        entries.remove(id);
        self.store.write(self.key, &entries);
        None
    }

    pub fn save(&self, id: &str, payload: T) {
        self.save_many([(id.to_string(), payload)]);
    }

    /// Stores several payloads with one write, all sharing one timestamp
    pub fn save_many(&self, items: impl IntoIterator<Item = (String, T)>) {
        let mut entries = self.load();
        let timestamp = self.clock.now();
        for (id, payload) in items {
            entries.insert(id, Stamped { payload, timestamp });
        }
        self.store.write(self.key, &entries);
    }

    /// Applies `f` to a stored payload in place, keeping its timestamp
    ///
    /// Returns false if there was no entry for `id`.
    pub fn update(&self, id: &str, f: impl FnOnce(&mut T)) -> bool {
        let mut entries = self.load();
        match entries.get_mut(id) {
            Some(entry) => {
                f(&mut entry.payload);
                self.store.write(self.key, &entries);
                true
            }
            None => false,
        }
    }

    pub fn info(&self) -> EntryInfo {
        if !self.store.contains(self.key) {
            return EntryInfo::default();
        }
        let entries = self.load();
        EntryInfo {
            present: true,
            count: entries.len(),
            timestamp: entries.values().map(|e| e.timestamp).max(),
        }
    }

    pub fn clear(&self) {
        self.store.delete(self.key);
    }
}

impl<T> Clone for KeyedCache<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            key: self.key,
            ttl: self.ttl,
            clock: self.clock.clone(),
            _payload: PhantomData,
        }
    }
}
