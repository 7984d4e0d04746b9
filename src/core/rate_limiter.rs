//! Session-scoped sliding-window limiter for provider calls.
//!
//! Every session owns a [`RateWindow`] holding the instants of its admitted
//! calls. A call is admitted only while fewer than `quota` of those instants
//! fall inside the trailing `window`, so no interval of length `window` ever
//! contains more than `quota` admissions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::utils::constants::{DEFAULT_RATE_LIMIT_QUOTA, DEFAULT_RATE_LIMIT_WINDOW_SECS};

/// Source of "now" for the limiter.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.origin + offset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub quota: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            quota: DEFAULT_RATE_LIMIT_QUOTA,
            window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        }
    }
}

/// Admitted-call timestamps for one session, oldest first.
#[derive(Debug, Default, Clone)]
pub struct RateWindow {
    admitted: VecDeque<Instant>,
    total: u64,
    last_admitted_at: Option<DateTime<Utc>>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    fn purge(&mut self, now: Instant, config: &RateLimitConfig) {
        while let Some(oldest) = self.admitted.front() {
            if now.saturating_duration_since(*oldest) >= config.window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }

    /// Purges expired entries, then records `now` if the quota allows it.
    /// A rejected call leaves the window untouched.
    pub fn admit(&mut self, now: Instant, config: &RateLimitConfig) -> bool {
        self.purge(now, config);

        if config.window.is_zero() {
            self.total += 1;
            self.last_admitted_at = Some(Utc::now());
            return true;
        }

        if (self.admitted.len() as u64) < config.quota as u64 {
            self.admitted.push_back(now);
            self.total += 1;
            self.last_admitted_at = Some(Utc::now());
            true
        } else {
            false
        }
    }

    /// Calls admitted within the trailing window ending at `now`.
    pub fn count(&self, now: Instant, config: &RateLimitConfig) -> usize {
        self.admitted
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < config.window)
            .count()
    }

    /// Time until the next call would be admitted, or `None` if it would be
    /// admitted now.
    pub fn retry_after(&self, now: Instant, config: &RateLimitConfig) -> Option<Duration> {
        if config.window.is_zero() {
            return None;
        }
        if config.quota == 0 {
            return Some(config.window);
        }

        let live: Vec<&Instant> = self
            .admitted
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < config.window)
            .collect();
        if live.len() < config.quota as usize {
            return None;
        }

        // the slot that frees first belongs to the oldest call that must
        // expire to bring the count under quota
        let blocking = live[live.len() - config.quota as usize];
        let elapsed = now.saturating_duration_since(*blocking);
        Some(config.window.saturating_sub(elapsed))
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn last_admitted(&self) -> Option<DateTime<Utc>> {
        self.last_admitted_at
    }

    // a zero window records nothing, so emptiness says nothing about activity
    fn is_idle(&self, now: Instant, config: &RateLimitConfig) -> bool {
        !config.window.is_zero() && self.count(now, config) == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimited {
    pub retry_after: Duration,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionUsage {
    pub requests_in_window: usize,
    pub total_requests: u64,
    pub quota: u32,
    pub window_secs: u64,
    pub last_request_at: Option<DateTime<Utc>>,
    pub retry_after_secs: Option<u64>,
}

/// One [`RateWindow`] per session, sharing a clock and a config.
pub struct SessionLimiters {
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
    windows: Mutex<HashMap<SessionId, RateWindow>>,
}

impl SessionLimiters {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn admit(&self, session: SessionId) -> Result<(), RateLimited> {
        let now = self.clock.now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        // forget sessions with nothing left in their window; their lifetime
        // totals go with them
        let config = self.config;
        windows.retain(|id, w| *id == session || !w.is_idle(now, &config));

        let window = windows.entry(session).or_default();
        if window.admit(now, &self.config) {
            Ok(())
        } else {
            let retry_after = window
                .retry_after(now, &self.config)
                .unwrap_or(self.config.window);
            Err(RateLimited { retry_after })
        }
    }

    pub fn usage(&self, session: SessionId) -> SessionUsage {
        let now = self.clock.now();
        let windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let window = windows.get(&session);

        SessionUsage {
            requests_in_window: window.map(|w| w.count(now, &self.config)).unwrap_or(0),
            total_requests: window.map(RateWindow::total).unwrap_or(0),
            quota: self.config.quota,
            window_secs: self.config.window.as_secs(),
            last_request_at: window.and_then(RateWindow::last_admitted),
            retry_after_secs: window
                .map(|w| w.retry_after(now, &self.config))
                .unwrap_or_else(|| RateWindow::new().retry_after(now, &self.config))
                .map(|d| d.as_secs_f64().ceil() as u64),
        }
    }

    pub fn tracked_sessions(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
