//! Cache module for persisting fetched records
//!
//! All caches sit on a `CacheStore`, which holds one JSON blob per key. Each
//! blob carries a creation timestamp and the identity or record id it is
//! scoped to; entries past their time-to-live, or read under another
//! identity, are treated as missing and deleted.

mod comments;
mod entry;
mod leads;
mod store;
mod tasks;

pub use comments::{CommentCache, COMMENTS_KEY, COMMENTS_TTL_MINUTES};
pub use entry::{is_fresh, EntryInfo, Identity, KeyedCache, ScopedCache, ScopedEntry, Stamped};
pub use leads::{
    CacheInfo, LeadCache, DETAIL_TTL_MINUTES, LEADS_LIST_KEY, LEAD_DETAILS_KEY, LIST_TTL_MINUTES,
};
pub use store::{CacheStore, FileStore, JsonStore, MemoryStore};
pub use tasks::{TaskCache, TASKS_KEY, TASKS_TTL_MINUTES};
