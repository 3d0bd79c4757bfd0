//! Rate limiter — fixed-window request counters per client, route and verb.
//!
//! GET-like and POST-like requests are counted in separate buckets so that
//! browsing a form never eats into the budget for submitting it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::http::Method;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;

/// Which counter a request is charged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerbClass {
    /// GET and HEAD.
    Read,
    /// Everything else.
    Write,
}

impl VerbClass {
    pub fn of(method: &Method) -> Self {
        if method == Method::GET || method == Method::HEAD {
            Self::Read
        } else {
            Self::Write
        }
    }
}

/// Identity of one counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub client: String,
    pub route: String,
    pub verb: VerbClass,
}

impl RateLimitKey {
    pub fn new(client: impl Into<String>, route: impl Into<String>, verb: VerbClass) -> Self {
        Self {
            client: client.into(),
            route: route.into(),
            verb,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Result of charging one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// In-memory fixed-window limiter.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<RateLimitKey, Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            windows: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn limit_for(&self, verb: VerbClass) -> u32 {
        match verb {
            VerbClass::Read => self.config.get_limit,
            VerbClass::Write => self.config.post_limit,
        }
    }

    /// Charge one request against `key`.
    pub async fn check(&self, key: RateLimitKey) -> Decision {
        self.check_at(key, Instant::now()).await
    }

    /// Charge one request at an explicit instant. The lookup, reset and
    /// increment happen under one lock, so concurrent requests from the same
    /// client never both see a stale count.
    pub async fn check_at(&self, key: RateLimitKey, now: Instant) -> Decision {
        let limit = self.limit_for(key.verb);
        let mut windows = self.windows.lock().await;

        let window = windows.entry(key.clone()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.saturating_duration_since(window.started) >= self.config.window {
            window.started = now;
            window.count = 0;
        }

        if window.count >= limit {
            warn!(
                client = %key.client,
                route = %key.route,
                verb = ?key.verb,
                limit,
                "Rate limit exceeded"
            );
            return Decision::Limited;
        }

        window.count += 1;
        Decision::Allowed {
            remaining: limit - window.count,
        }
    }

    /// Drop counters whose window has expired. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    pub async fn sweep_at(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, w| now.saturating_duration_since(w.started) < self.config.window);
        let removed = before - windows.len();
        if removed > 0 {
            debug!(removed, "Swept expired rate-limit windows");
        }
        removed
    }

    /// Number of live counters.
    pub async fn len(&self) -> usize {
        self.windows.lock().await.len()
    }
}

/// Spawn a background task that sweeps expired counters once per window.
pub fn spawn_sweep_task(limiter: Arc<RateLimiter>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        // `interval` panics on a zero period.
        let period = limiter.config.window.max(std::time::Duration::from_secs(1));
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            limiter.sweep().await;
        }
    })
}
