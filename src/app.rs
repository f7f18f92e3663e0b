//! Application context for leadsync
//!
//! `App` owns the caches, the clients and the session store, and exposes one
//! async operation per CLI command. It returns data; printing is left to the
//! binary.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::api::{ApiError, NewTask, WebhookClient};
use crate::cache::{CacheInfo, CommentCache, FileStore, Identity, JsonStore, LeadCache, TaskCache};
use crate::clock::{self, SharedClock};
use crate::config::{Config, ConfigError};
use crate::data::{sort_by_due, Comment, Lead, LeadStatus, Task, TaskStatus};
use crate::feed::{FetchMode, LeadFeed, Outcome};
use crate::query::LeadSummary;
use crate::refresh::{AutoRefresh, CooldownActive, CooldownGate, RefreshInterval};
use crate::session::{AuthClient, Session, SessionError, SessionStore};

/// Store key holding the instant of the last accepted manual refresh
pub const MANUAL_REFRESH_KEY: &str = "manual-refresh";

/// How often the watch loop checks for expired highlights
const FLAG_SWEEP: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cooldown(#[from] CooldownActive),

    #[error("{0}")]
    Fetch(String),

    #[error("Lead not found: {0}")]
    LeadNotFound(String),
}

/// Result of a lead load: the feed as it now stands and what the load did
pub struct LeadLoad {
    pub feed: LeadFeed,
    pub outcome: Outcome,
}

impl LeadLoad {
    /// Banner text when the load failed but older data is still shown
    pub fn banner(&self) -> Option<&str> {
        self.feed.last_error()
    }
}

/// Headline numbers for the summary command
#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
    pub leads: LeadSummary,
    pub open_tasks: usize,
    pub due_today: usize,
}

pub struct App {
    config: Config,
    store: JsonStore,
    clock: SharedClock,
    api: WebhookClient,
    auth: AuthClient,
    sessions: SessionStore,
    leads: LeadCache,
    tasks: TaskCache,
    comments: CommentCache,
    identity_override: Option<Identity>,
}

impl App {
    pub fn new(config: Config, store: JsonStore, clock: SharedClock) -> Self {
        let endpoints = &config.endpoints;
        let api = WebhookClient::new(&endpoints.leads_url, &endpoints.client_url);
        let auth = AuthClient::new(
            &endpoints.login_url,
            &endpoints.logout_url,
            &endpoints.profile_url,
        );
        let leads = LeadCache::new(
            store.clone(),
            config.cache.list_ttl(),
            config.cache.detail_ttl(),
            clock.clone(),
        );
        let tasks = TaskCache::new(store.clone(), config.cache.tasks_ttl(), clock.clone());
        let comments = CommentCache::new(store.clone(), config.cache.comments_ttl(), clock.clone());
        Self {
            sessions: SessionStore::new(store.clone()),
            config,
            store,
            clock,
            api,
            auth,
            leads,
            tasks,
            comments,
            identity_override: None,
        }
    }

    /// Builds the app on the configured (or platform) cache directory
    pub fn from_config(config: Config) -> Self {
        let store = match &config.cache.dir {
            Some(dir) => JsonStore::new(FileStore::with_dir(dir.clone())),
            None => JsonStore::open_default(),
        };
        Self::new(config, store, clock::system())
    }

    pub fn with_identity(mut self, identity: Option<Identity>) -> Self {
        self.identity_override = identity;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Identity to load data for: the override, else the stored session
    pub fn identity(&self) -> Result<Identity, AppError> {
        if let Some(identity) = &self.identity_override {
            return Ok(identity.clone());
        }
        Ok(self.sessions.load()?.identity())
    }

    pub async fn login(&self, employee_id: &str, password: &str) -> Result<Session, AppError> {
        match self.auth.login(employee_id, password).await {
            Ok(session) => {
                self.sessions.save(&session);
                Ok(session)
            }
            Err(e) => {
                self.sessions.teardown();
                Err(e.into())
            }
        }
    }

    pub async fn logout(&self) {
        self.auth.logout(&self.sessions).await;
        self.clear_cache(false);
    }

    fn feed_for(&self, identity: Identity) -> LeadFeed {
        let last_manual = self.store.read::<DateTime<Utc>>(MANUAL_REFRESH_KEY);
        let gate = CooldownGate::new(self.config.refresh.cooldown()).with_last(last_manual);
        let mut feed = LeadFeed::new(self.leads.clone(), self.clock.clone()).with_cooldown(gate);
        feed.set_identity(Some(identity));
        feed
    }

    async fn fetch_leads(&self, identity: Identity) -> Result<Vec<Lead>, ApiError> {
        self.api.fetch_leads(&identity, self.clock.now()).await
    }

    /// Loads the lead list in `mode`
    ///
    /// A failed fetch with nothing to fall back on is an error; a failed
    /// fetch over older data is reported through `LeadLoad::banner`.
    pub async fn load_leads(&self, mode: FetchMode) -> Result<LeadLoad, AppError> {
        let identity = self.identity()?;
        let mut feed = self.feed_for(identity);
        let outcome = feed.load(mode, |id| self.fetch_leads(id)).await;

        if mode == FetchMode::Manual && !matches!(outcome, Outcome::RateLimited(_)) {
            if let Some(last) = feed.cooldown().last() {
                self.store.write(MANUAL_REFRESH_KEY, &last);
            }
        }

        match outcome {
            Outcome::RateLimited(cooldown) => Err(cooldown.into()),
            Outcome::SignedOut => Err(SessionError::NotSignedIn.into()),
            Outcome::Failed { message } if feed.leads().is_empty() => Err(AppError::Fetch(message)),
            outcome => Ok(LeadLoad { feed, outcome }),
        }
    }

    /// One lead, from the detail cache when fresh, with its comments
    pub async fn lead_detail(&self, lead_id: &str) -> Result<(Lead, Vec<Comment>), AppError> {
        let lead = match self.leads.get_detail(lead_id) {
            Some(lead) => lead,
            None => self
                .load_leads(FetchMode::Initial)
                .await?
                .feed
                .find(lead_id)
                .ok_or_else(|| AppError::LeadNotFound(lead_id.to_string()))?,
        };
        let comments = self.comments(lead_id).await?;
        Ok((lead, comments))
    }

    pub async fn comments(&self, lead_id: &str) -> Result<Vec<Comment>, AppError> {
        if let Some(comments) = self.comments.get(lead_id) {
            return Ok(comments);
        }
        let identity = self.identity()?;
        match self.api.fetch_comments(&identity, lead_id).await {
            Ok(comments) => {
                self.comments.save(lead_id, &comments);
                Ok(comments)
            }
            Err(e) if e.is_malformed_body() => {
                tracing::warn!(error = %e, lead_id, "unreadable comments response");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All tasks, earliest due first
    pub async fn tasks(&self) -> Result<Vec<Task>, AppError> {
        let identity = self.identity()?;
        if let Some(mut tasks) = self.tasks.get(&identity) {
            sort_by_due(&mut tasks);
            return Ok(tasks);
        }
        match self.api.fetch_tasks(&identity).await {
            Ok(tasks) => {
                self.tasks.save(&tasks, &identity);
                Ok(tasks)
            }
            Err(e) if e.is_malformed_body() => {
                tracing::warn!(error = %e, "unreadable tasks response");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Lead and task headline numbers, fetched concurrently
    pub async fn overview(&self) -> Result<Overview, AppError> {
        let (leads, tasks) = futures::join!(self.load_leads(FetchMode::Initial), self.tasks());
        let leads = leads?;
        let tasks = tasks?;
        let today = self.now().date_naive();
        Ok(Overview {
            leads: LeadSummary::from_leads(leads.feed.leads()),
            open_tasks: tasks.iter().filter(|t| t.status != TaskStatus::Done).count(),
            due_today: tasks
                .iter()
                .filter(|t| t.due().is_some_and(|d| d.date_naive() == today))
                .count(),
        })
    }

    pub async fn set_status(&self, lead_id: &str, status: LeadStatus) -> Result<(), AppError> {
        let identity = self.identity()?;
        self.api.change_status(&identity, lead_id, status).await?;
        if !self.leads.update_status(lead_id, status) {
            tracing::debug!(lead_id, "status changed for a lead not in cache");
        }
        Ok(())
    }

    pub async fn assign(&self, lead_ids: &[String], assignee: &str) -> Result<(), AppError> {
        let identity = self.identity()?;
        self.api.bulk_assign(&identity, lead_ids, assignee).await?;
        // Assignment can move leads out of this user's list
        self.leads.clear_all();
        Ok(())
    }

    pub async fn add_task(&self, task: &NewTask) -> Result<(), AppError> {
        let identity = self.identity()?;
        self.api.create_task(&identity, task).await?;
        self.tasks.clear();
        Ok(())
    }

    pub async fn set_task_status(
        &self,
        task_id: &str,
        lead_id: &str,
        status: TaskStatus,
    ) -> Result<(), AppError> {
        self.api.update_task_status(task_id, lead_id, status).await?;
        self.tasks.clear();
        Ok(())
    }

    pub fn cache_info(&self) -> CacheInfo {
        self.leads.info()
    }

    pub fn clear_cache(&self, details_only: bool) {
        if details_only {
            self.leads.clear_details();
            return;
        }
        self.leads.clear_all();
        self.tasks.clear();
        self.comments.clear();
        tracing::info!("cache cleared");
    }

    /// Loads the list, then keeps it fresh until Ctrl-C
    ///
    /// `report` runs after the initial load and after every auto refresh.
    pub async fn watch<F>(&self, interval: RefreshInterval, report: F) -> Result<(), AppError>
    where
        F: Fn(&LeadFeed, &Outcome) + Send + Sync + 'static,
    {
        let load = self.load_leads(FetchMode::Initial).await?;
        report(&load.feed, &load.outcome);

        let feed = Arc::new(Mutex::new(load.feed));
        let report = Arc::new(report);
        let mut auto = AutoRefresh::new();
        {
            let feed = feed.clone();
            let api = self.api.clone();
            let clock = self.clock.clone();
            auto.start(interval, move || {
                let feed = feed.clone();
                let api = api.clone();
                let clock = clock.clone();
                let report = report.clone();
                async move {
                    let ticket = match feed.lock().await.begin(FetchMode::Auto) {
                        Ok(Some(ticket)) => ticket,
                        _ => return,
                    };
                    let result = api.fetch_leads(ticket.identity(), clock.now()).await;
                    let mut feed = feed.lock().await;
                    let outcome = feed.complete(ticket, result);
                    (*report)(&*feed, &outcome);
                }
            });
        }
        tracing::info!(interval_secs = interval.as_duration().as_secs(), "watching leads");

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut sweep = tokio::time::interval(FLAG_SWEEP);
        loop {
            tokio::select! {
                _ = &mut ctrl_c => break,
                _ = sweep.tick() => {
                    let now = self.clock.now();
                    feed.lock().await.clear_expired_flags(now);
                }
            }
        }

        auto.stop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn app_at(store: JsonStore, base: &str) -> App {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        let mut config = Config::default();
        config.endpoints.leads_url = format!("{}/leads", base);
        config.endpoints.client_url = format!("{}/client", base);
        App::new(config, store, Arc::new(clock))
    }

    fn app_with(store: JsonStore) -> App {
        app_at(store, "http://127.0.0.1:9")
    }

    /// Reads one HTTP request, headers and body
    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let line = line.to_ascii_lowercase();
                        line.strip_prefix("content-length:")
                            .and_then(|v| v.trim().parse::<usize>().ok())
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    /// Answers every request with `body` and counts them
    async fn serve_body(body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    read_request(&mut socket).await;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        (format!("http://{}", addr), hits)
    }

    fn me() -> Identity {
        Identity::new("EMP1", "emp1@example.com")
    }

    fn lead(id: &str) -> Lead {
        Lead {
            id: id.to_string(),
            name: format!("Lead {}", id),
            created_at: "2024-05-01 10:00:00".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_identity_requires_session_or_override() {
        let app = app_with(JsonStore::new(MemoryStore::new()));
        assert!(matches!(
            app.identity(),
            Err(AppError::Session(SessionError::NotSignedIn))
        ));

        let app = app.with_identity(Some(me()));
        assert_eq!(app.identity().unwrap(), me());
    }

    #[tokio::test]
    async fn test_initial_load_served_from_cache_without_network() {
        let app = app_with(JsonStore::new(MemoryStore::new())).with_identity(Some(me()));
        app.leads.save_list(&[lead("1"), lead("2")], &me());

        let load = app.load_leads(FetchMode::Initial).await.unwrap();

        assert_eq!(load.outcome, Outcome::Cached { count: 2 });
        assert!(load.banner().is_none());
    }

    #[tokio::test]
    async fn test_failed_load_without_data_is_error() {
        let app = app_with(JsonStore::new(MemoryStore::new())).with_identity(Some(me()));

        let result = app.load_leads(FetchMode::Initial).await;

        assert!(matches!(result, Err(AppError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_manual_refresh_cooldown_survives_restart() {
        let store = JsonStore::new(MemoryStore::new());
        let app = app_with(store.clone()).with_identity(Some(me()));

        // The fetch fails, but the attempt still starts the cooldown
        let _ = app.load_leads(FetchMode::Manual).await;
        assert!(store.contains(MANUAL_REFRESH_KEY));

        let restarted = app_with(store).with_identity(Some(me()));
        let second = restarted.load_leads(FetchMode::Manual).await;
        assert!(matches!(second, Err(AppError::Cooldown(_))));
    }

    #[tokio::test]
    async fn test_lead_detail_from_cache() {
        let app = app_with(JsonStore::new(MemoryStore::new())).with_identity(Some(me()));
        app.leads.save_list(&[lead("7")], &me());
        app.comments.save("7", &[]);

        let (lead, comments) = app.lead_detail("7").await.unwrap();

        assert_eq!(lead.name, "Lead 7");
        assert!(comments.is_empty());
    }

    #[tokio::test]
    async fn test_overview_from_caches() {
        let app = app_with(JsonStore::new(MemoryStore::new())).with_identity(Some(me()));
        let mut won = lead("1");
        won.status = LeadStatus::Won;
        app.leads.save_list(&[won, lead("2")], &me());
        let tasks = vec![
            Task {
                id: "T1".to_string(),
                due_date: "2024-06-01 17:00:00".to_string(),
                ..Default::default()
            },
            Task {
                id: "T2".to_string(),
                status: TaskStatus::Done,
                ..Default::default()
            },
        ];
        app.tasks.save(&tasks, &me());

        let overview = app.overview().await.unwrap();

        assert_eq!(overview.leads.total, 2);
        assert_eq!(overview.leads.conversion_rate, 50);
        assert_eq!(overview.open_tasks, 1);
        assert_eq!(overview.due_today, 1);
    }

    #[test]
    fn test_clear_cache_details_only() {
        let app = app_with(JsonStore::new(MemoryStore::new()));
        app.leads.save_list(&[lead("1")], &me());

        app.clear_cache(true);
        let info = app.cache_info();
        assert!(info.has_list);
        assert!(!info.has_details);

        app.clear_cache(false);
        assert_eq!(app.cache_info(), CacheInfo::default());
    }

    #[tokio::test]
    async fn test_unreadable_tasks_are_empty_and_not_cached() {
        let (base, hits) = serve_body("<html>gateway error</html>").await;
        let app = app_at(JsonStore::new(MemoryStore::new()), &base).with_identity(Some(me()));

        assert!(app.tasks().await.unwrap().is_empty());
        assert_eq!(app.tasks.cached_count(), None);

        assert!(app.tasks().await.unwrap().is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreadable_comments_are_empty_and_not_cached() {
        let (base, hits) = serve_body("{\"oops\"").await;
        let app = app_at(JsonStore::new(MemoryStore::new()), &base).with_identity(Some(me()));

        assert!(app.comments("7").await.unwrap().is_empty());
        assert!(app.comments.get("7").is_none());

        assert!(app.comments("7").await.unwrap().is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_readable_tasks_are_cached() {
        let (base, hits) = serve_body("[]").await;
        let app = app_at(JsonStore::new(MemoryStore::new()), &base).with_identity(Some(me()));

        assert!(app.tasks().await.unwrap().is_empty());
        assert!(app.tasks().await.unwrap().is_empty());

        assert_eq!(app.tasks.cached_count(), Some(0));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetched_activity_is_anchored_on_app_clock() {
        let (base, _hits) = serve_body(
            r#"[{"name": "CRM-LEAD-9", "lead_name": "Meera", "creation": "2024-05-30 08:00:00", "modified": "2024-06-01 06:00:00"}]"#,
        )
        .await;
        let app = app_at(JsonStore::new(MemoryStore::new()), &base).with_identity(Some(me()));

        let load = app.load_leads(FetchMode::Manual).await.unwrap();

        // The app clock reads 2024-06-01 08:00
        assert_eq!(load.outcome, Outcome::Replaced { count: 1 });
        assert_eq!(load.feed.leads()[0].last_activity, "2 hours ago");
    }
}
