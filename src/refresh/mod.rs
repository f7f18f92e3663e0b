//! Lead refresh: incremental diffing and refresh timing
//!
//! `diff` merges a freshly fetched lead list into the one on screen and
//! flags what changed. `scheduler` owns the auto-refresh loop and the
//! cooldown on manual refreshes.

pub mod diff;
pub mod scheduler;

pub use diff::{
    clear_flags, fingerprint, full_replace, merge_incremental, sort_newest_first, MergeSummary,
    Merged, FLAG_DISPLAY_WINDOW,
};
pub use scheduler::{
    AutoRefresh, CooldownActive, CooldownGate, IntervalError, RefreshConfig, RefreshInterval,
    DEFAULT_INTERVAL, MANUAL_COOLDOWN, MAX_INTERVAL, MIN_INTERVAL,
};
