//! Fixed-window rate limiting.
//!
//! Each client gets at most `max_requests` requests per `window`. Counters
//! are process-wide and reset when the window elapses. Requests over the
//! cap fail with HTTP 429.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;

use crate::AppState;
use crate::config::RateLimitConfig;
use crate::errors::{Error, Result};

/// Prune stale windows once the map grows past this many clients.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Per-client fixed-window request counter.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    /// Creates a rate limiter from configuration.
    ///
    /// If `max_requests` is 0, returns `None` (limiting disabled).
    pub fn new(config: &RateLimitConfig) -> Option<Self> {
        if config.max_requests == 0 {
            return None;
        }
        Some(Self {
            max_requests: config.max_requests,
            window: config.window,
            windows: DashMap::new(),
        })
    }

    /// Counts one request for `key`.
    ///
    /// Returns `Err(RateLimited)` when the key has already used its quota
    /// for the current window. The counter resets once the window elapses.
    pub fn check(&self, key: &str) -> Result<()> {
        let now = Instant::now();

        let mut entry = self.windows.entry(key.to_string()).or_insert_with(|| Window { started: now, count: 0 });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            return Err(Error::RateLimited);
        }
        entry.count += 1;
        drop(entry);

        if self.windows.len() > PRUNE_THRESHOLD {
            let window = self.window;
            self.windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        Ok(())
    }
}

/// Derive the rate-limit key for a request: first `X-Forwarded-For` hop if
/// present, otherwise the socket peer address, otherwise a shared bucket.
fn client_key(request: &Request) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first_hop) = value.split(',').next()
    {
        let first_hop = first_hop.trim();
        if !first_hop.is_empty() {
            return first_hop.to_string();
        }
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

/// Axum middleware applying the configured rate limit to every request.
pub async fn rate_limit_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(limiter) = &state.limiter
        && let Err(e) = limiter.check(&client_key(&request))
    {
        return e.into_response();
    }
    next.run(request).await
}
