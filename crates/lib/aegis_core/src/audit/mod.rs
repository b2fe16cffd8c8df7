// @awa-component: SEC-AuditLogger
//
//! Append-only audit trail.
//!
//! Entries are validated against the closed action/category catalog and the
//! metadata size cap before they reach a store. The caller's identity is
//! applied here, not trusted from input: anonymous callers are limited to a
//! small allow-list and never carry a user id, authenticated callers always
//! carry their own.

pub mod catalog;
pub mod queries;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::models::audit::{
    AuditAction, AuditCategory, AuditFilter, AuditLogEntry, AuditPage, NewAuditEntry, PageRequest,
    RetentionSweep,
};
use crate::models::auth::Session;
use crate::task::{shield, spawn_best_effort};

pub use queries::PgAuditStore;
pub use store::{AuditStore, MemoryAuditStore};

/// Largest page the read path returns.
pub const MAX_PAGE_SIZE: u32 = 200;
const DETACHED_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Audit errors.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Audit store error: {0}")]
    Store(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

/// Who is recording an entry.
#[derive(Debug, Clone)]
pub enum AuditCaller {
    /// Trusted in-process code; `user_id` is taken from the entry as given.
    System,
    /// Authenticated session; `user_id` is forced to the session user.
    User(Session),
    /// Unauthenticated request; restricted to the anonymous allow-list.
    Anonymous,
}

/// Records, reads and sweeps audit entries.
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    fn prepare(entry: NewAuditEntry, caller: &AuditCaller) -> Result<NewAuditEntry, AuditError> {
        catalog::validate_metadata(&entry.metadata)?;
        let mut entry = entry;
        match caller {
            AuditCaller::System => {}
            AuditCaller::User(session) => entry.user_id = Some(session.user_id.clone()),
            AuditCaller::Anonymous => {
                if !catalog::anonymous_allowed(entry.category, entry.action) {
                    return Err(AuditError::Forbidden(format!(
                        "{}/{} requires an authenticated caller",
                        entry.category, entry.action
                    )));
                }
                entry.user_id = None;
            }
        }
        Ok(entry)
    }

    /// Validate and append an entry.
    ///
    /// Security-critical categories are written on a shielded task so the
    /// write completes even if the caller is cancelled.
    pub async fn record(
        &self,
        entry: NewAuditEntry,
        caller: &AuditCaller,
    ) -> Result<AuditLogEntry, AuditError> {
        let entry = Self::prepare(entry, caller)?;
        debug!(action = %entry.action, category = %entry.category, "recording audit entry");

        if entry.category.is_security_critical() {
            let store = Arc::clone(&self.store);
            shield(async move { store.insert(entry).await })
                .await
                .map_err(|e| AuditError::Store(e.to_string()))?
        } else {
            self.store.insert(entry).await
        }
    }

    /// Record without waiting. Validation and store failures are logged.
    pub fn record_detached(&self, entry: NewAuditEntry, caller: AuditCaller) -> JoinHandle<()> {
        let logger = self.clone();
        spawn_best_effort("audit.record", DETACHED_WRITE_TIMEOUT, async move {
            logger.record(entry, &caller).await.map(|_| ())
        })
    }

    /// Filtered, keyset-paginated read, newest first.
    pub async fn query(&self, filter: &AuditFilter, page: PageRequest) -> Result<AuditPage, AuditError> {
        let limit = page.limit.clamp(1, MAX_PAGE_SIZE);
        let mut entries = self.store.query(filter, page.before, limit + 1).await?;

        let next_cursor = if entries.len() > limit as usize {
            entries.truncate(limit as usize);
            entries.last().map(|e| e.id)
        } else {
            None
        };
        Ok(AuditPage {
            entries,
            next_cursor,
        })
    }

    /// Mark entries as read. Content is never changed.
    pub async fn mark_read(&self, ids: &[i64]) -> Result<u64, AuditError> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.store.mark_read(ids).await
    }

    /// Retention sweep. Records an `audit_purged` entry with the count.
    pub async fn purge(
        &self,
        sweep: RetentionSweep,
        initiated_by: Option<&str>,
    ) -> Result<u64, AuditError> {
        if sweep.older_than > Utc::now() {
            return Err(AuditError::Validation(
                "retention cutoff must not be in the future".into(),
            ));
        }

        let store = Arc::clone(&self.store);
        let deleted = shield(async move { store.purge(&sweep).await })
            .await
            .map_err(|e| AuditError::Store(e.to_string()))??;
        info!(deleted, only_read = sweep.only_read, "audit retention sweep");

        let mut marker = NewAuditEntry::new(AuditAction::AuditPurged, AuditCategory::System)
            .meta("deleted", deleted)
            .meta("olderThan", sweep.older_than.to_rfc3339())
            .meta("onlyRead", sweep.only_read);
        if let Some(user_id) = initiated_by {
            marker = marker.user(user_id);
        }
        self.record(marker, &AuditCaller::System).await?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    use super::*;
    use crate::models::auth::Role;

    fn setup() -> (AuditLogger, Arc<MemoryAuditStore>) {
        let store = Arc::new(MemoryAuditStore::new());
        (AuditLogger::new(store.clone()), store)
    }

    fn admin() -> AuditCaller {
        AuditCaller::User(Session::new("admin-1", Role::Admin))
    }

    #[tokio::test]
    async fn user_caller_cannot_spoof_user_id() {
        let (logger, _) = setup();
        let entry = logger
            .record(
                NewAuditEntry::new(AuditAction::SettingsChanged, AuditCategory::Admin).user("someone-else"),
                &admin(),
            )
            .await
            .unwrap();
        assert_eq!(entry.user_id.as_deref(), Some("admin-1"));
    }

    #[tokio::test]
    async fn anonymous_restricted_to_allow_list() {
        let (logger, store) = setup();
        let ok = logger
            .record(
                NewAuditEntry::new(AuditAction::LoginFailed, AuditCategory::Auth).user("claimed"),
                &AuditCaller::Anonymous,
            )
            .await
            .unwrap();
        assert_eq!(ok.user_id, None);

        let err = logger
            .record(
                NewAuditEntry::new(AuditAction::PermissionGranted, AuditCategory::Admin),
                &AuditCaller::Anonymous,
            )
            .await;
        assert!(matches!(err, Err(AuditError::Forbidden(_))));
        assert_eq!(store.all().await.len(), 1);
    }

    #[tokio::test]
    async fn oversized_metadata_is_rejected() {
        let (logger, store) = setup();
        let err = logger
            .record(
                NewAuditEntry::new(AuditAction::ToolUsed, AuditCategory::Tools)
                    .meta("payload", "x".repeat(3000)),
                &AuditCaller::System,
            )
            .await;
        assert!(matches!(err, Err(AuditError::Validation(_))));
        assert!(store.all().await.is_empty());
    }

    #[tokio::test]
    async fn query_paginates_newest_first() {
        let (logger, _) = setup();
        for i in 0..5 {
            logger
                .record(
                    NewAuditEntry::new(AuditAction::ToolUsed, AuditCategory::Tools).meta("n", i),
                    &AuditCaller::System,
                )
                .await
                .unwrap();
        }
        logger
            .record(
                NewAuditEntry::new(AuditAction::LoginSuccess, AuditCategory::Auth),
                &AuditCaller::System,
            )
            .await
            .unwrap();

        let filter = AuditFilter {
            category: Some(AuditCategory::Tools),
            ..AuditFilter::default()
        };
        let first = logger
            .query(&filter, PageRequest { before: None, limit: 2 })
            .await
            .unwrap();
        assert_eq!(first.entries.len(), 2);
        assert_eq!(first.entries[0].metadata["n"], json!(4));
        assert_eq!(first.entries[1].metadata["n"], json!(3));

        let second = logger
            .query(
                &filter,
                PageRequest {
                    before: first.next_cursor,
                    limit: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(second.entries[0].metadata["n"], json!(2));

        let last = logger
            .query(
                &filter,
                PageRequest {
                    before: second.next_cursor,
                    limit: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(last.entries.len(), 1);
        assert_eq!(last.next_cursor, None);
    }

    #[tokio::test]
    async fn page_size_is_clamped() {
        let (logger, _) = setup();
        logger
            .record(
                NewAuditEntry::new(AuditAction::ToolUsed, AuditCategory::Tools),
                &AuditCaller::System,
            )
            .await
            .unwrap();
        let page = logger
            .query(&AuditFilter::default(), PageRequest { before: None, limit: 0 })
            .await
            .unwrap();
        assert_eq!(page.entries.len(), 1);
    }

    #[tokio::test]
    async fn mark_read_changes_only_read_status() {
        let (logger, store) = setup();
        let written = logger
            .record(
                NewAuditEntry::new(AuditAction::RoleChanged, AuditCategory::Users)
                    .target("user", "u-9")
                    .meta("to", "moderator"),
                &admin(),
            )
            .await
            .unwrap();

        assert_eq!(logger.mark_read(&[written.id, 999]).await.unwrap(), 1);
        assert_eq!(logger.mark_read(&[written.id]).await.unwrap(), 0);

        let stored = store.all().await.remove(0);
        assert!(stored.read_at.is_some());
        assert_eq!(
            AuditLogEntry {
                read_at: None,
                ..stored
            },
            written
        );

        let unread = logger
            .query(
                &AuditFilter {
                    unread_only: true,
                    ..AuditFilter::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert!(unread.entries.is_empty());
    }

    #[tokio::test]
    async fn purge_by_age_and_read_status_leaves_marker() {
        let (logger, store) = setup();
        let read = logger
            .record(
                NewAuditEntry::new(AuditAction::ToolUsed, AuditCategory::Tools),
                &AuditCaller::System,
            )
            .await
            .unwrap();
        logger
            .record(
                NewAuditEntry::new(AuditAction::ToolUsed, AuditCategory::Tools),
                &AuditCaller::System,
            )
            .await
            .unwrap();
        logger.mark_read(&[read.id]).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let cutoff = Utc::now();
        let deleted = logger
            .purge(
                RetentionSweep {
                    older_than: cutoff,
                    only_read: true,
                },
                Some("admin-1"),
            )
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let remaining = store.all().await;
        assert_eq!(remaining.len(), 2);
        let marker = remaining.last().unwrap();
        assert_eq!(marker.action, AuditAction::AuditPurged);
        assert_eq!(marker.user_id.as_deref(), Some("admin-1"));
        assert_eq!(marker.metadata["deleted"], json!(1));
    }

    #[tokio::test]
    async fn purge_rejects_future_cutoff() {
        let (logger, _) = setup();
        let err = logger
            .purge(
                RetentionSweep {
                    older_than: Utc::now() + ChronoDuration::days(1),
                    only_read: false,
                },
                None,
            )
            .await;
        assert!(matches!(err, Err(AuditError::Validation(_))));
    }

    #[tokio::test]
    async fn detached_write_lands_without_blocking_caller() {
        let (logger, store) = setup();
        let handle = logger.record_detached(
            NewAuditEntry::new(AuditAction::ToolUsed, AuditCategory::Tools),
            AuditCaller::System,
        );
        handle.await.unwrap();
        assert_eq!(store.all().await.len(), 1);
    }
}
