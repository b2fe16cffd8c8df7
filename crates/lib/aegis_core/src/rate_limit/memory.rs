//! In-process rate limit store.
//!
//! Correct only for a single process; multi-instance deployments use
//! [`super::PgRateLimitStore`]. Each increment holds the DashMap shard lock
//! for its entry, which serializes concurrent callers on one identifier.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{RateLimitError, RateLimitStore, WindowOutcome};

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    window_start_ms: i64,
    window_ms: u64,
    count: u32,
}

impl WindowEntry {
    fn expired_at(&self, now_ms: i64, window_ms: u64) -> bool {
        // A window longer than the clock range never ends.
        let Ok(window_ms) = i64::try_from(window_ms) else {
            return false;
        };
        now_ms.saturating_sub(self.window_start_ms) >= window_ms
    }
}

/// DashMap-backed store keyed by identifier.
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    entries: DashMap<String, WindowEntry>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of stored entries, void ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn increment(
        &self,
        identifier: &str,
        limit: u32,
        window_ms: u64,
        now_ms: i64,
    ) -> Result<WindowOutcome, RateLimitError> {
        let mut entry = self
            .entries
            .entry(identifier.to_string())
            .or_insert(WindowEntry {
                window_start_ms: now_ms,
                window_ms,
                count: 0,
            });

        if entry.expired_at(now_ms, window_ms) {
            *entry = WindowEntry {
                window_start_ms: now_ms,
                window_ms,
                count: 0,
            };
        }

        if entry.count < limit {
            entry.count += 1;
            Ok(WindowOutcome::Admitted {
                window_start_ms: entry.window_start_ms,
                count: entry.count,
            })
        } else {
            Ok(WindowOutcome::Rejected {
                window_start_ms: entry.window_start_ms,
            })
        }
    }

    async fn reset(&self, identifier: &str) -> Result<(), RateLimitError> {
        self.entries.remove(identifier);
        Ok(())
    }

    async fn prune_expired(&self, now_ms: i64) -> Result<u64, RateLimitError> {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| !e.expired_at(now_ms, e.window_ms));
        Ok(before.saturating_sub(self.entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejected_calls_are_not_counted() {
        let store = MemoryRateLimitStore::new();
        for _ in 0..5 {
            store.increment("k", 2, 1_000, 0).await.unwrap();
        }
        assert_eq!(store.entries.get("k").map(|e| e.count), Some(2));
    }

    #[tokio::test]
    async fn prune_removes_only_void_entries() {
        let store = MemoryRateLimitStore::new();
        store.increment("old", 1, 1_000, 0).await.unwrap();
        store.increment("fresh", 1, 1_000, 900).await.unwrap();
        assert_eq!(store.prune_expired(1_000).await.unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.entries.contains_key("fresh"));
    }

    #[tokio::test]
    async fn oversized_window_does_not_wrap() {
        let store = MemoryRateLimitStore::new();
        store.increment("huge", 5, u64::MAX, 0).await.unwrap();
        let second = store.increment("huge", 5, u64::MAX, 10_000).await.unwrap();
        assert_eq!(
            second,
            WindowOutcome::Admitted {
                window_start_ms: 0,
                count: 2
            }
        );
        assert_eq!(store.prune_expired(i64::MAX).await.unwrap(), 0);
    }
}
