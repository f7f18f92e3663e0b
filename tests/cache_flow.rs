//! Lead cache and feed behaviour against a real on-disk store

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use leadsync::api::ApiError;
use leadsync::cache::{FileStore, Identity, JsonStore, LeadCache};
use leadsync::clock::{ManualClock, SharedClock};
use leadsync::data::{Lead, LeadStatus};
use leadsync::feed::{FetchMode, LeadFeed, Outcome};
use tempfile::TempDir;

fn lead(id: &str, status: LeadStatus, created: &str) -> Lead {
    Lead {
        id: id.to_string(),
        name: format!("Lead {}", id),
        status,
        created_at: created.to_string(),
        ..Default::default()
    }
}

fn backend() -> Vec<Lead> {
    vec![
        lead("L1", LeadStatus::New, "2024-06-01 09:00:00"),
        lead("L2", LeadStatus::Contacted, "2024-06-02 09:00:00"),
    ]
}

async fn serve(leads: Vec<Lead>) -> Result<Vec<Lead>, ApiError> {
    Ok(leads)
}

async fn unreachable_backend(_: Identity) -> Result<Vec<Lead>, ApiError> {
    panic!("cache should have served this load");
}

fn open_feed(dir: &TempDir, clock: &ManualClock) -> LeadFeed {
    let shared: SharedClock = Arc::new(clock.clone());
    let store = JsonStore::new(FileStore::with_dir(dir.path().to_path_buf()));
    let mut feed = LeadFeed::new(LeadCache::with_defaults(store, shared.clone()), shared);
    feed.set_identity(Some(Identity::new("EMP1", "emp1@example.com")));
    feed
}

#[tokio::test]
async fn test_cached_list_survives_restart() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap());

    let mut first = open_feed(&dir, &clock);
    let outcome = first
        .load(FetchMode::Initial, |_| serve(backend()))
        .await;
    assert_eq!(outcome, Outcome::Replaced { count: 2 });
    drop(first);

    let mut second = open_feed(&dir, &clock);
    let outcome = second.load(FetchMode::Initial, unreachable_backend).await;

    assert_eq!(outcome, Outcome::Cached { count: 2 });
    assert_eq!(second.leads()[0].id, "L2", "newest lead first");
}

#[tokio::test]
async fn test_expired_list_goes_back_to_network() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap());

    let mut feed = open_feed(&dir, &clock);
    feed.load(FetchMode::Initial, |_| serve(backend())).await;

    clock.advance(Duration::minutes(6));
    let mut reopened = open_feed(&dir, &clock);
    let mut fresh = backend();
    fresh.push(lead("L3", LeadStatus::New, "2024-06-03 07:00:00"));
    let outcome = reopened
        .load(FetchMode::Initial, |_| serve(fresh))
        .await;

    assert_eq!(outcome, Outcome::Replaced { count: 3 });
}

#[tokio::test]
async fn test_auto_refresh_flags_changes_and_persists_clean_list() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap());
    let mut feed = open_feed(&dir, &clock);
    feed.load(FetchMode::Initial, |_| serve(backend())).await;

    let mut changed = backend();
    changed[0].status = LeadStatus::Qualified;
    changed.push(lead("L3", LeadStatus::New, "2024-06-03 07:00:00"));
    let outcome = feed.load(FetchMode::Auto, |_| serve(changed)).await;

    let Outcome::Merged(summary) = outcome else {
        panic!("expected a merge, got {:?}", outcome);
    };
    assert_eq!((summary.new, summary.modified, summary.total), (1, 1, 3));
    assert!(feed.find("L3").unwrap().is_new);
    assert!(feed.find("L1").unwrap().is_modified);

    let mut reopened = open_feed(&dir, &clock);
    reopened.load(FetchMode::Initial, unreachable_backend).await;
    assert_eq!(reopened.leads().len(), 3);
    assert!(reopened.leads().iter().all(|l| !l.is_new && !l.is_modified));
}

#[tokio::test]
async fn test_manual_refresh_is_rate_limited() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap());
    let mut feed = open_feed(&dir, &clock);

    let outcome = feed.load(FetchMode::Manual, |_| serve(backend())).await;
    assert_eq!(outcome, Outcome::Replaced { count: 2 });

    clock.advance(Duration::seconds(30));
    let outcome = feed.load(FetchMode::Manual, |_| serve(backend())).await;
    let Outcome::RateLimited(cooldown) = outcome else {
        panic!("expected the cooldown, got {:?}", outcome);
    };
    assert_eq!(cooldown.remaining_secs(), 90);

    clock.advance(Duration::seconds(90));
    let outcome = feed.load(FetchMode::Manual, |_| serve(backend())).await;
    assert_eq!(outcome, Outcome::Replaced { count: 2 });
}
