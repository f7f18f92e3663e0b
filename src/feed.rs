//! The lead list a view displays, and how fetches update it
//!
//! A `LeadFeed` holds the on-screen list, the last fetched list (flags
//! cleared) and the identity it is loading for. Every fetch is issued a
//! `Ticket`; a response is applied only if its ticket is still the latest
//! one for the current identity, so a slow response can never overwrite a
//! newer one or land on another user's screen.
//!
//! Initial and manual loads replace the list wholesale. Auto refreshes go
//! through the incremental merge and flag what changed for a few seconds.

use chrono::{DateTime, Utc};
use std::future::Future;

use crate::api::ApiError;
use crate::cache::{Identity, LeadCache};
use crate::clock::SharedClock;
use crate::data::{Lead, LeadStatus};
use crate::refresh::{
    clear_flags, full_replace, merge_incremental, CooldownActive, CooldownGate, MergeSummary,
    FLAG_DISPLAY_WINDOW,
};

/// Why a fetch is happening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// First load for an identity; served from cache when fresh
    Initial,
    /// User-triggered; rate limited, always goes to the network
    Manual,
    /// Timer-triggered; merged incrementally
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Syncing,
    Disconnected,
}

/// Proof that a fetch was issued, checked when its response arrives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    identity: Identity,
    mode: FetchMode,
}

impl Ticket {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }
}

/// What a load did to the feed
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Served from a fresh cache entry
    Cached { count: usize },
    /// Replaced wholesale from the network
    Replaced { count: usize },
    /// Merged incrementally from an auto refresh
    Merged(MergeSummary),
    /// Fetch failed; the previous list stays on screen
    Failed { message: String },
    /// Response body was unreadable; ignored, previous list kept
    Ignored,
    /// Response arrived after a newer request or an identity change
    Stale,
    /// Manual refresh refused by the cooldown
    RateLimited(CooldownActive),
    /// No identity to load for
    SignedOut,
}

pub struct LeadFeed {
    cache: LeadCache,
    clock: SharedClock,
    cooldown: CooldownGate,
    identity: Option<Identity>,
    leads: Vec<Lead>,
    last_fetched: Vec<Lead>,
    generation: u64,
    flagged_at: Option<DateTime<Utc>>,
    status: ConnectionStatus,
    last_error: Option<String>,
    last_updated: Option<DateTime<Utc>>,
    last_summary: MergeSummary,
}

impl LeadFeed {
    pub fn new(cache: LeadCache, clock: SharedClock) -> Self {
        Self {
            cache,
            clock,
            cooldown: CooldownGate::default(),
            identity: None,
            leads: Vec::new(),
            last_fetched: Vec::new(),
            generation: 0,
            flagged_at: None,
            status: ConnectionStatus::Connected,
            last_error: None,
            last_updated: None,
            last_summary: MergeSummary::default(),
        }
    }

    pub fn with_cooldown(mut self, cooldown: CooldownGate) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Switches the feed to another user, dropping everything held for the old one
    ///
    /// Responses to requests issued before the switch are discarded.
    pub fn set_identity(&mut self, identity: Option<Identity>) {
        if self.identity == identity {
            return;
        }
        self.generation += 1;
        self.identity = identity;
        self.leads.clear();
        self.last_fetched.clear();
        self.flagged_at = None;
        self.last_error = None;
        self.last_updated = None;
        self.last_summary = MergeSummary::default();
        self.status = ConnectionStatus::Connected;
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn leads(&self) -> &[Lead] {
        &self.leads
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Message for the error banner, if the last fetch failed
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Counts from the most recent auto-refresh merge
    pub fn last_summary(&self) -> MergeSummary {
        self.last_summary
    }

    pub fn cooldown(&self) -> &CooldownGate {
        &self.cooldown
    }

    /// Issues a ticket for a fetch in `mode`
    ///
    /// Manual fetches must pass the cooldown first. Returns `Ok(None)` when
    /// there is no identity to fetch for.
    pub fn begin(&mut self, mode: FetchMode) -> Result<Option<Ticket>, CooldownActive> {
        let Some(identity) = self.identity.clone() else {
            return Ok(None);
        };
        if mode == FetchMode::Manual {
            self.cooldown.try_acquire(self.clock.now())?;
        }
        self.generation += 1;
        if mode == FetchMode::Auto {
            self.status = ConnectionStatus::Syncing;
        }
        Ok(Some(Ticket {
            generation: self.generation,
            identity,
            mode,
        }))
    }

    /// Serves an initial load from the cache when the entry is fresh
    pub fn try_cached(&mut self, ticket: &Ticket) -> Option<Outcome> {
        if ticket.mode != FetchMode::Initial || !self.is_current(ticket) {
            return None;
        }
        let cached = self.cache.get_list(&ticket.identity)?;
        let count = cached.len();
        self.replace(full_replace(cached));
        self.last_error = None;
        self.status = ConnectionStatus::Connected;
        Some(Outcome::Cached { count })
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.generation == self.generation && self.identity.as_ref() == Some(&ticket.identity)
    }

    fn replace(&mut self, leads: Vec<Lead>) {
        self.last_fetched = leads.clone();
        self.leads = leads;
        self.flagged_at = None;
        self.last_summary = MergeSummary::default();
    }

    /// Applies a fetch result for `ticket`
    pub fn complete(&mut self, ticket: Ticket, result: Result<Vec<Lead>, ApiError>) -> Outcome {
        if !self.is_current(&ticket) {
            tracing::debug!(mode = ?ticket.mode, "discarding stale lead response");
            return Outcome::Stale;
        }

        let incoming = match result {
            Ok(leads) => leads,
            Err(e) if e.is_malformed_body() => {
                tracing::warn!(error = %e, "ignoring unreadable lead response");
                self.status = ConnectionStatus::Connected;
                return Outcome::Ignored;
            }
            Err(e) => {
                tracing::warn!(error = %e, "lead fetch failed, keeping last known list");
                let message = format!("Failed to fetch leads: {}", e);
                self.last_error = Some(message.clone());
                self.status = ConnectionStatus::Disconnected;
                return Outcome::Failed { message };
            }
        };

        let now = self.clock.now();
        let outcome = if ticket.mode == FetchMode::Auto && !self.last_fetched.is_empty() {
            let merged = merge_incremental(&self.last_fetched, incoming);
            let summary = merged.summary;
            tracing::info!(
                new = summary.new,
                modified = summary.modified,
                total = summary.total,
                "auto-refresh merged"
            );
            self.leads = merged.leads;
            self.last_fetched = self.leads.clone();
            clear_flags(&mut self.last_fetched);
            self.flagged_at = summary.has_changes().then_some(now);
            self.last_summary = summary;
            Outcome::Merged(summary)
        } else {
            let leads = full_replace(incoming);
            let count = leads.len();
            tracing::info!(count, "lead list replaced");
            self.replace(leads);
            Outcome::Replaced { count }
        };

        self.cache.save_list(&self.last_fetched, &ticket.identity);
        self.last_error = None;
        self.last_updated = Some(now);
        self.status = ConnectionStatus::Connected;
        outcome
    }

    /// Runs a whole load: ticket, cache check, fetch, apply
    ///
    /// `fetch` receives the identity to load for. Callers that share the
    /// feed between tasks should use `begin`/`complete` directly and not hold
    /// a lock across the fetch.
    pub async fn load<F, Fut>(&mut self, mode: FetchMode, fetch: F) -> Outcome
    where
        F: FnOnce(Identity) -> Fut,
        Fut: Future<Output = Result<Vec<Lead>, ApiError>>,
    {
        let ticket = match self.begin(mode) {
            Ok(Some(ticket)) => ticket,
            Ok(None) => return Outcome::SignedOut,
            Err(cooldown) => return Outcome::RateLimited(cooldown),
        };
        if let Some(outcome) = self.try_cached(&ticket) {
            return outcome;
        }
        let result = fetch(ticket.identity.clone()).await;
        self.complete(ticket, result)
    }

    /// Drops new/modified highlights once the display window has passed
    ///
    /// Returns true if any highlight was cleared.
    pub fn clear_expired_flags(&mut self, now: DateTime<Utc>) -> bool {
        let Some(flagged_at) = self.flagged_at else {
            return false;
        };
        let window = chrono::Duration::from_std(FLAG_DISPLAY_WINDOW).unwrap_or_default();
        if now - flagged_at < window {
            return false;
        }
        self.flagged_at = None;
        clear_flags(&mut self.leads)
    }

    /// Applies a status change locally after the backend accepted it
    pub fn apply_status(&mut self, lead_id: &str, status: LeadStatus) -> bool {
        let mut found = false;
        for lead in self
            .leads
            .iter_mut()
            .chain(self.last_fetched.iter_mut())
            .filter(|l| l.id == lead_id)
        {
            lead.status = status;
            lead.last_activity = "Just now".to_string();
            found = true;
        }
        self.cache.update_status(lead_id, status) || found
    }

    /// Looks a lead up in memory, then in the detail cache
    pub fn find(&self, lead_id: &str) -> Option<Lead> {
        self.leads
            .iter()
            .find(|l| l.id == lead_id)
            .cloned()
            .or_else(|| self.cache.get_detail(lead_id))
    }
}
