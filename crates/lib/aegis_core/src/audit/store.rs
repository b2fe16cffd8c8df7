//! Audit storage seam and the in-memory backend.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::AuditError;
use crate::models::audit::{AuditFilter, AuditLogEntry, NewAuditEntry, RetentionSweep};

/// Append-only audit storage. No method rewrites an entry's content.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append an already-validated entry and return it with its assigned id.
    async fn insert(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, AuditError>;

    /// Up to `limit` matching entries with `id < before`, newest first.
    async fn query(
        &self,
        filter: &AuditFilter,
        before: Option<i64>,
        limit: u32,
    ) -> Result<Vec<AuditLogEntry>, AuditError>;

    /// Set `read_at` on unread entries among `ids`. Returns the number changed.
    async fn mark_read(&self, ids: &[i64]) -> Result<u64, AuditError>;

    /// Delete entries matching the sweep. Returns the number deleted.
    async fn purge(&self, sweep: &RetentionSweep) -> Result<u64, AuditError>;
}

/// In-memory store keyed by id.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    entries: RwLock<BTreeMap<i64, AuditLogEntry>>,
    next_id: AtomicI64,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry, oldest first.
    pub async fn all(&self) -> Vec<AuditLogEntry> {
        self.entries.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn insert(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, AuditError> {
        let mut entries = self.entries.write().await;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = AuditLogEntry {
            id,
            action: entry.action,
            category: entry.category,
            user_id: entry.user_id,
            target_id: entry.target_id,
            target_type: entry.target_type,
            metadata: entry.metadata,
            ip_address: entry.origin.ip_address,
            user_agent: entry.origin.user_agent,
            created_at: Utc::now(),
            read_at: None,
        };
        entries.insert(id, stored.clone());
        Ok(stored)
    }

    async fn query(
        &self,
        filter: &AuditFilter,
        before: Option<i64>,
        limit: u32,
    ) -> Result<Vec<AuditLogEntry>, AuditError> {
        let entries = self.entries.read().await;
        let upper = before.unwrap_or(i64::MAX);
        Ok(entries
            .range(..upper)
            .rev()
            .map(|(_, e)| e)
            .filter(|e| filter.matches(e))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, ids: &[i64]) -> Result<u64, AuditError> {
        let mut entries = self.entries.write().await;
        let now = Utc::now();
        let mut changed = 0;
        for id in ids {
            if let Some(entry) = entries.get_mut(id)
                && entry.read_at.is_none()
            {
                entry.read_at = Some(now);
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn purge(&self, sweep: &RetentionSweep) -> Result<u64, AuditError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| {
            let expired = e.created_at < sweep.older_than;
            let eligible = !sweep.only_read || e.read_at.is_some();
            !(expired && eligible)
        });
        Ok((before - entries.len()) as u64)
    }
}
