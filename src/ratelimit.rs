//! Fixed-window throttle for outbound actions, keyed by `(action, identifier)`.
//!
//! Call sites that send things on a user's behalf (password-reset mail,
//! verification mail) ask `check` before acting; within one window at most
//! `max_requests` calls are allowed per key. Records are pruned
//! opportunistically on read and by a periodic sweep.
//!
//! The in-memory backing is single-instance-only: counters are not shared
//! across processes, which is an operational limitation, not a bug. The
//! `RateLimitStore` trait is the seam for swapping in a shared external
//! store without touching call sites. The proxy path never consults this —
//! the gateway forwards every request it receives.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

pub const DEFAULT_MAX_REQUESTS: u32 = 3;
pub const DEFAULT_WINDOW_SECS: i64 = 60 * 60;

/// Snapshot of one key's window, for surfacing "try again later" hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub count: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Capability interface for rate limiting. Backed in-memory here; a
/// multi-instance deployment would back it with a shared store instead.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Returns `true` if the action is allowed (and records it),
    /// `false` if the key is over its window budget.
    async fn check(
        &self,
        action: &str,
        identifier: &str,
        max_requests: u32,
        window: Duration,
    ) -> bool;

    /// Current window state for a key, or `None` if no live record exists.
    async fn info(&self, action: &str, identifier: &str, max_requests: u32)
        -> Option<RateLimitInfo>;

    /// Drop all expired records.
    async fn prune_expired(&self);
}

// ─── In-memory implementation ─────────────────────────────────────────────────

struct WindowRecord {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// `action:identifier` → window record.
pub struct MemoryRateLimiter {
    records: Mutex<HashMap<String, WindowRecord>>,
}

impl Default for MemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    fn key(action: &str, identifier: &str) -> String {
        format!("{action}:{identifier}")
    }

    /// `check` against an explicit clock, for deterministic tests.
    pub async fn check_at(
        &self,
        action: &str,
        identifier: &str,
        max_requests: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        let key = Self::key(action, identifier);
        let mut records = self.records.lock().await;

        match records.get_mut(&key) {
            // No record, or the previous window has expired: start fresh.
            None => {
                records.insert(
                    key,
                    WindowRecord {
                        count: 1,
                        reset_at: now + window,
                    },
                );
                true
            }
            Some(record) if now > record.reset_at => {
                record.count = 1;
                record.reset_at = now + window;
                true
            }
            Some(record) if record.count >= max_requests => false,
            Some(record) => {
                record.count += 1;
                true
            }
        }
    }

    pub async fn info_at(
        &self,
        action: &str,
        identifier: &str,
        max_requests: u32,
        now: DateTime<Utc>,
    ) -> Option<RateLimitInfo> {
        let key = Self::key(action, identifier);
        let mut records = self.records.lock().await;

        let expired = records.get(&key).is_some_and(|r| now > r.reset_at);
        if expired {
            // Opportunistic prune on read.
            records.remove(&key);
            return None;
        }

        records.get(&key).map(|record| RateLimitInfo {
            count: record.count,
            remaining: max_requests.saturating_sub(record.count),
            reset_at: record.reset_at,
        })
    }

    pub async fn prune_expired_at(&self, now: DateTime<Utc>) {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| now <= record.reset_at);
        let pruned = before - records.len();
        if pruned > 0 {
            debug!(pruned, "rate-limit records expired");
        }
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimiter {
    async fn check(
        &self,
        action: &str,
        identifier: &str,
        max_requests: u32,
        window: Duration,
    ) -> bool {
        self.check_at(action, identifier, max_requests, window, Utc::now())
            .await
    }

    async fn info(
        &self,
        action: &str,
        identifier: &str,
        max_requests: u32,
    ) -> Option<RateLimitInfo> {
        self.info_at(action, identifier, max_requests, Utc::now())
            .await
    }

    async fn prune_expired(&self) {
        self.prune_expired_at(Utc::now()).await;
    }
}

/// Periodic sweep so idle keys do not accumulate between reads.
pub fn spawn_sweeper(
    limiter: Arc<MemoryRateLimiter>,
    every: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            limiter.prune_expired().await;
        }
    })
}
