//! Refresh timing: the auto-refresh loop and the manual-refresh cooldown
//!
//! The auto-refresh loop runs as a tokio task. It sleeps for the interval,
//! runs one refresh to completion, and only then arms the next sleep, so a
//! slow refresh pushes the following one back rather than overlapping it.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Shortest accepted auto-refresh interval
pub const MIN_INTERVAL: Duration = Duration::from_secs(60);

/// Longest accepted auto-refresh interval
pub const MAX_INTERVAL: Duration = Duration::from_secs(900);

/// Auto-refresh interval used when none is configured
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(900);

/// Minimum gap between two accepted manual refreshes
pub const MANUAL_COOLDOWN: Duration = Duration::from_secs(120);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntervalError {
    #[error("refresh interval must be between 60 and 900 seconds, got {0}")]
    OutOfRange(u64),
}

/// Validated auto-refresh interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshInterval(Duration);

impl RefreshInterval {
    pub fn from_secs(secs: u64) -> Result<Self, IntervalError> {
        let interval = Duration::from_secs(secs);
        if interval < MIN_INTERVAL || interval > MAX_INTERVAL {
            return Err(IntervalError::OutOfRange(secs));
        }
        Ok(Self(interval))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl Default for RefreshInterval {
    fn default() -> Self {
        Self(DEFAULT_INTERVAL)
    }
}

/// Configuration for the auto-refresh loop
#[derive(Debug, Clone, Default)]
pub struct RefreshConfig {
    pub interval: RefreshInterval,
    /// Whether auto-refresh is enabled
    pub enabled: bool,
}

/// Handle to a running auto-refresh loop
///
/// At most one loop runs per handle: `start` stops the previous loop before
/// arming a new one. `stop` is idempotent and also runs on drop. A refresh
/// already in flight when `stop` is called is allowed to finish, but no
/// further refresh starts.
#[derive(Debug, Default)]
pub struct AutoRefresh {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl AutoRefresh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the loop, calling `refresh` once per interval
    pub fn start<F, Fut>(&mut self, interval: RefreshInterval, mut refresh: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.stop();

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let period = interval.as_duration();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    _ = &mut shutdown_rx => break,
                }
                tracing::debug!("auto-refresh tick");
                refresh().await;
            }
            tracing::debug!("auto-refresh loop stopped");
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);
    }

    /// Starts or stops the loop according to `config`
    pub fn apply<F, Fut>(&mut self, config: &RefreshConfig, refresh: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if config.enabled {
            self.start(config.interval, refresh);
        } else {
            self.stop();
        }
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.task = None;
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Rejection of a manual refresh that came too soon
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("manual refresh available again in {}s", ceil_secs(.remaining))]
pub struct CooldownActive {
    pub remaining: chrono::Duration,
}

fn ceil_secs(d: &chrono::Duration) -> i64 {
    let ms = d.num_milliseconds();
    (ms + 999) / 1000
}

impl CooldownActive {
    /// Remaining wait rounded up to whole seconds, for countdowns
    pub fn remaining_secs(&self) -> i64 {
        ceil_secs(&self.remaining)
    }
}

/// Time gate on manual refreshes
///
/// Only the instant of the last accepted request matters; whether that
/// refresh succeeded does not.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    cooldown: chrono::Duration,
    last: Option<DateTime<Utc>>,
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new(MANUAL_COOLDOWN)
    }
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown: chrono::Duration::from_std(cooldown).unwrap_or(chrono::Duration::MAX),
            last: None,
        }
    }

    /// Restores the gate from a previously recorded instant
    pub fn with_last(mut self, last: Option<DateTime<Utc>>) -> Self {
        self.last = last;
        self
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.last
    }

    /// Time left before a manual refresh is accepted, if any
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        let last = self.last?;
        let remaining = self.cooldown - (now - last);
        (remaining > chrono::Duration::zero()).then_some(remaining)
    }

    /// Accepts and records a manual refresh at `now`, or says how long to wait
    pub fn try_acquire(&mut self, now: DateTime<Utc>) -> Result<(), CooldownActive> {
        if let Some(remaining) = self.remaining(now) {
            return Err(CooldownActive { remaining });
        }
        self.last = Some(now);
        Ok(())
    }
}
