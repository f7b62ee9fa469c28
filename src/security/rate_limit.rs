//! Per-IP fixed-window rate limiting.
//!
//! Each client IP owns a counter and the instant its current window
//! started. Rollover is lazy: the first request after the window elapsed
//! restarts the window with a count of 1.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use dashmap::DashMap;
use futures_util::future::BoxFuture;

use crate::security::gate::{Gate, InboundRequest, Rejection, RejectionKind, Verdict};

/// Table size above which expired windows are purged.
const CLEANUP_THRESHOLD: usize = 10_000;

/// Source of "now" for window arithmetic.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Wall clock backed by `Instant::now`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Result of recording one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// In-memory per-IP counters. Entries are sharded by `DashMap`, so
/// concurrent increments for one IP are serialized without a global lock.
pub struct RateLimiter<C: Clock = SystemClock> {
    windows: DashMap<IpAddr, Window>,
    window: Duration,
    max_requests: u32,
    clock: C,
}

impl RateLimiter<SystemClock> {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self::with_clock(window, max_requests, SystemClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(window: Duration, max_requests: u32, clock: C) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            max_requests,
            clock,
        }
    }

    /// Count a request from `ip` and decide whether it may proceed.
    pub fn hit(&self, ip: IpAddr) -> RateDecision {
        let now = self.clock.now();

        if self.windows.len() > CLEANUP_THRESHOLD {
            self.purge_expired(now);
        }

        let mut entry = self.windows.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }
        entry.count = entry.count.saturating_add(1);

        if entry.count > self.max_requests {
            let elapsed = now.duration_since(entry.started);
            RateDecision::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            }
        } else {
            RateDecision::Allowed {
                remaining: self.max_requests - entry.count,
            }
        }
    }

    /// Drop windows that ended before `now`.
    pub fn purge_expired(&self, now: Instant) {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < self.window);
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            tracing::debug!(
                removed_entries = removed,
                remaining_entries = self.windows.len(),
                "Rate limiter cleanup completed"
            );
        }
    }
}

/// Gate rejecting with 429 once an IP exceeds its window budget.
pub struct RateLimitGate<C: Clock = SystemClock> {
    limiter: RateLimiter<C>,
}

impl<C: Clock> RateLimitGate<C> {
    pub fn new(limiter: RateLimiter<C>) -> Self {
        Self { limiter }
    }
}

impl<C: Clock> Gate for RateLimitGate<C> {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn check<'a>(&'a self, request: &'a mut InboundRequest) -> BoxFuture<'a, Verdict> {
        let verdict = match self.limiter.hit(request.client_ip) {
            RateDecision::Allowed { .. } => Verdict::Admit,
            RateDecision::Limited { retry_after } => Verdict::Reject(
                Rejection::new(
                    RejectionKind::RateLimited,
                    StatusCode::TOO_MANY_REQUESTS,
                    "Too many requests, please try again later",
                )
                .with_retry_after(retry_after.as_secs_f64().ceil() as u64),
            ),
        };
        Box::pin(async move { verdict })
    }
}
