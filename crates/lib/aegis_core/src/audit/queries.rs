//! PostgreSQL audit store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::warn;

use super::AuditError;
use super::store::AuditStore;
use crate::models::audit::{
    AuditAction, AuditCategory, AuditFilter, AuditLogEntry, NewAuditEntry, RetentionSweep,
};

const COLUMNS: &str = "id, action, category, user_id, target_id, target_type, metadata::text, \
                       ip_address, user_agent, created_at, read_at";

type AuditRow = (
    i64,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

fn from_row(row: AuditRow) -> Result<AuditLogEntry, AuditError> {
    let (
        id,
        action,
        category,
        user_id,
        target_id,
        target_type,
        metadata,
        ip_address,
        user_agent,
        created_at,
        read_at,
    ) = row;

    let action = AuditAction::parse(&action)
        .ok_or_else(|| AuditError::Store(format!("stored entry {id} has unknown action {action}")))?;
    let category = AuditCategory::parse(&category).ok_or_else(|| {
        AuditError::Store(format!("stored entry {id} has unknown category {category}"))
    })?;
    let metadata = parse_metadata(id, &metadata);

    Ok(AuditLogEntry {
        id,
        action,
        category,
        user_id,
        target_id,
        target_type,
        metadata,
        ip_address,
        user_agent,
        created_at,
        read_at,
    })
}

/// Stored metadata as an object. Anything else is logged and read back empty
/// so one bad row does not fail a whole page.
fn parse_metadata(id: i64, raw: &str) -> serde_json::Map<String, serde_json::Value> {
    match serde_json::from_str(raw) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(other) => {
            warn!(id, kind = json_kind(&other), "audit metadata is not an object");
            serde_json::Map::new()
        }
        Err(e) => {
            warn!(id, error = %e, "audit metadata is not valid JSON");
            serde_json::Map::new()
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Store backed by the `audit_logs` table.
#[derive(Debug, Clone)]
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn insert(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, AuditError> {
        let metadata = serde_json::Value::Object(entry.metadata).to_string();
        let row = sqlx::query_as::<_, AuditRow>(&format!(
            "INSERT INTO audit_logs \
             (action, category, user_id, target_id, target_type, metadata, ip_address, user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6::jsonb, $7, $8) \
             RETURNING {COLUMNS}"
        ))
        .bind(entry.action.as_str())
        .bind(entry.category.as_str())
        .bind(entry.user_id)
        .bind(entry.target_id)
        .bind(entry.target_type)
        .bind(metadata)
        .bind(entry.origin.ip_address)
        .bind(entry.origin.user_agent)
        .fetch_one(&self.pool)
        .await?;
        from_row(row)
    }

    async fn query(
        &self,
        filter: &AuditFilter,
        before: Option<i64>,
        limit: u32,
    ) -> Result<Vec<AuditLogEntry>, AuditError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM audit_logs WHERE TRUE"));

        if let Some(before) = before {
            qb.push(" AND id < ").push_bind(before);
        }
        if let Some(category) = filter.category {
            qb.push(" AND category = ").push_bind(category.as_str());
        }
        if let Some(action) = filter.action {
            qb.push(" AND action = ").push_bind(action.as_str());
        }
        if let Some(user_id) = &filter.user_id {
            qb.push(" AND user_id = ").push_bind(user_id.clone());
        }
        if let Some(target_id) = &filter.target_id {
            qb.push(" AND target_id = ").push_bind(target_id.clone());
        }
        if let Some(from) = filter.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND created_at < ").push_bind(to);
        }
        if filter.unread_only {
            qb.push(" AND read_at IS NULL");
        }
        qb.push(" ORDER BY id DESC LIMIT ").push_bind(i64::from(limit));

        let rows = qb.build_query_as::<AuditRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(from_row).collect()
    }

    async fn mark_read(&self, ids: &[i64]) -> Result<u64, AuditError> {
        let result = sqlx::query(
            "UPDATE audit_logs SET read_at = now() WHERE id = ANY($1) AND read_at IS NULL",
        )
        .bind(ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn purge(&self, sweep: &RetentionSweep) -> Result<u64, AuditError> {
        let result = sqlx::query(
            "DELETE FROM audit_logs WHERE created_at < $1 AND ($2 = FALSE OR read_at IS NOT NULL)",
        )
        .bind(sweep.older_than)
        .bind(sweep.only_read)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditCaller, AuditLogger};
    use crate::models::audit::PageRequest;
    use std::sync::Arc;

    #[test]
    fn malformed_metadata_reads_back_empty() {
        assert_eq!(parse_metadata(1, r#"{"field":"name"}"#)["field"], "name");
        assert!(parse_metadata(2, "[1,2]").is_empty());
        assert!(parse_metadata(3, "{not json").is_empty());
    }

    async fn logger() -> AuditLogger {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.unwrap();
        crate::migrate::migrate(&pool).await.unwrap();
        AuditLogger::new(Arc::new(PgAuditStore::new(pool)))
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL (DATABASE_URL)"]
    async fn insert_query_and_mark_read() {
        let logger = logger().await;
        let target = crate::uuid::uuidv7().to_string();
        let written = logger
            .record(
                NewAuditEntry::new(AuditAction::UserUpdated, AuditCategory::Users)
                    .target("user", target.clone())
                    .meta("field", "name"),
                &AuditCaller::System,
            )
            .await
            .unwrap();

        let filter = AuditFilter {
            target_id: Some(target),
            ..AuditFilter::default()
        };
        let page = logger.query(&filter, PageRequest::default()).await.unwrap();
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].id, written.id);
        assert_eq!(page.entries[0].metadata["field"], "name");

        assert_eq!(logger.mark_read(&[written.id]).await.unwrap(), 1);
        let page = logger.query(&filter, PageRequest::default()).await.unwrap();
        assert!(page.entries[0].read_at.is_some());
        assert_eq!(page.entries[0].action, AuditAction::UserUpdated);
    }
}
