// @awa-component: SEC-RateLimiter
//
//! Fixed-window rate limiting over a shared, atomically updated store.
//!
//! Admission for one identifier is a single atomic store operation
//! (`INSERT … ON CONFLICT DO UPDATE … WHERE` in PostgreSQL, an entry lock in
//! memory), never a read followed by a write. A window starts at the first
//! admitted call and is replaced once `now - window_start >= window_ms`.

pub mod memory;
pub mod postgres;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::rate_limit::{
    OperationClass, RateLimitDecision, RateLimitPolicy, StoreFailurePolicy,
};
use crate::task::shield;

pub use memory::MemoryRateLimitStore;
pub use postgres::PgRateLimitStore;

/// Longest accepted window; stores keep millisecond timestamps as `i64`.
pub const MAX_WINDOW_MS: u64 = i64::MAX as u64;

/// Rate limit store errors.
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Rate limit store unavailable: {0}")]
    Store(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

/// Result of one atomic increment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOutcome {
    /// Counted; `count` includes this call.
    Admitted { window_start_ms: i64, count: u32 },
    /// Window already full; nothing was recorded.
    Rejected { window_start_ms: i64 },
}

/// Storage backend. Implementations own their concurrency: `increment` must
/// be linearizable per identifier.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Admit one operation if the current window for `identifier` holds fewer
    /// than `limit` admissions, starting a fresh window when the stored one
    /// has expired at `now_ms`.
    async fn increment(
        &self,
        identifier: &str,
        limit: u32,
        window_ms: u64,
        now_ms: i64,
    ) -> Result<WindowOutcome, RateLimitError>;

    /// Remove the entry for `identifier`.
    async fn reset(&self, identifier: &str) -> Result<(), RateLimitError>;

    /// Delete entries whose window ended before `now_ms`. Returns the count removed.
    async fn prune_expired(&self, now_ms: i64) -> Result<u64, RateLimitError>;
}

/// Fixed-window limiter with per-class policies.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    policies: HashMap<OperationClass, RateLimitPolicy>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, policies: HashMap<OperationClass, RateLimitPolicy>) -> Self {
        Self { store, policies }
    }

    /// Configured policy for a class.
    pub fn policy(&self, class: OperationClass) -> RateLimitPolicy {
        self.policies
            .get(&class)
            .copied()
            .unwrap_or_else(|| class.default_policy())
    }

    /// Check `class:subject` against the class policy.
    pub async fn check_policy(&self, class: OperationClass, subject: &str) -> RateLimitDecision {
        let policy = self.policy(class);
        self.check_and_increment(
            &class.identifier(subject),
            policy.limit,
            policy.window_ms,
            policy.on_store_error,
        )
        .await
    }

    /// Atomically count one operation against `identifier`.
    ///
    /// Store failures resolve according to `on_store_error`; they never
    /// surface as errors so every call site must pick a policy explicitly.
    pub async fn check_and_increment(
        &self,
        identifier: &str,
        limit: u32,
        window_ms: u64,
        on_store_error: StoreFailurePolicy,
    ) -> RateLimitDecision {
        self.check_and_increment_at(
            identifier,
            limit,
            window_ms,
            on_store_error,
            Utc::now().timestamp_millis(),
        )
        .await
    }

    /// [`RateLimiter::check_and_increment`] with an explicit clock.
    pub async fn check_and_increment_at(
        &self,
        identifier: &str,
        limit: u32,
        window_ms: u64,
        on_store_error: StoreFailurePolicy,
        now_ms: i64,
    ) -> RateLimitDecision {
        if limit == 0 {
            return RateLimitDecision::denied(window_ms);
        }
        if window_ms > MAX_WINDOW_MS {
            warn!(identifier, window_ms, "rate limit window out of range, denying");
            return RateLimitDecision::denied(MAX_WINDOW_MS);
        }

        let store = Arc::clone(&self.store);
        let key = identifier.to_string();
        let outcome = shield(async move { store.increment(&key, limit, window_ms, now_ms).await })
            .await
            .map_err(|e| RateLimitError::Store(e.to_string()))
            .and_then(|r| r);

        match outcome {
            Ok(WindowOutcome::Admitted {
                window_start_ms,
                count,
            }) => RateLimitDecision {
                allowed: true,
                remaining: limit.saturating_sub(count),
                reset_in_ms: reset_in(window_start_ms, window_ms, now_ms),
            },
            Ok(WindowOutcome::Rejected { window_start_ms }) => {
                debug!(identifier, limit, "rate limit exceeded");
                RateLimitDecision::denied(reset_in(window_start_ms, window_ms, now_ms))
            }
            Err(e) => match on_store_error {
                StoreFailurePolicy::FailClosed => {
                    warn!(identifier, error = %e, "rate limit store unavailable, failing closed");
                    RateLimitDecision::denied(window_ms)
                }
                StoreFailurePolicy::FailOpen => {
                    warn!(identifier, error = %e, "rate limit store unavailable, failing open");
                    RateLimitDecision {
                        allowed: true,
                        remaining: limit.saturating_sub(1),
                        reset_in_ms: window_ms,
                    }
                }
            },
        }
    }

    /// Clear throttling for an identifier.
    pub async fn reset(&self, identifier: &str) -> Result<(), RateLimitError> {
        let store = Arc::clone(&self.store);
        let key = identifier.to_string();
        shield(async move { store.reset(&key).await })
            .await
            .map_err(|e| RateLimitError::Store(e.to_string()))?
    }

    /// Delete void entries.
    pub async fn prune_expired(&self) -> Result<u64, RateLimitError> {
        self.store
            .prune_expired(Utc::now().timestamp_millis())
            .await
    }
}

fn reset_in(window_start_ms: i64, window_ms: u64, now_ms: i64) -> u64 {
    let window_ms = i64::try_from(window_ms).unwrap_or(i64::MAX);
    let end = window_start_ms.saturating_add(window_ms);
    u64::try_from(end.saturating_sub(now_ms)).unwrap_or(0)
}
