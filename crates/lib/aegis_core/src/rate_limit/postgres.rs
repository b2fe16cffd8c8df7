//! PostgreSQL rate limit store.
//!
//! One row per identifier. Admission is a single upsert whose `WHERE` clause
//! is evaluated under the row lock, so concurrent instances cannot both pass
//! the last free slot.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{RateLimitError, RateLimitStore, WindowOutcome};

const INCREMENT_SQL: &str = r#"
INSERT INTO rate_limits (identifier, window_start_ms, window_ms, count)
VALUES ($1, $2, $3, 1)
ON CONFLICT (identifier) DO UPDATE SET
    window_start_ms = CASE
        WHEN $2 - rate_limits.window_start_ms >= $3 THEN $2
        ELSE rate_limits.window_start_ms
    END,
    window_ms = $3,
    count = CASE
        WHEN $2 - rate_limits.window_start_ms >= $3 THEN 1
        ELSE rate_limits.count + 1
    END
WHERE $2 - rate_limits.window_start_ms >= $3
   OR rate_limits.count < $4
RETURNING window_start_ms, count
"#;

/// Store backed by the `rate_limits` table.
#[derive(Debug, Clone)]
pub struct PgRateLimitStore {
    pool: PgPool,
}

impl PgRateLimitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitStore for PgRateLimitStore {
    async fn increment(
        &self,
        identifier: &str,
        limit: u32,
        window_ms: u64,
        now_ms: i64,
    ) -> Result<WindowOutcome, RateLimitError> {
        let window = i64::try_from(window_ms).unwrap_or(i64::MAX);
        let limit = i32::try_from(limit).unwrap_or(i32::MAX);

        let admitted = sqlx::query_as::<_, (i64, i32)>(INCREMENT_SQL)
            .bind(identifier)
            .bind(now_ms)
            .bind(window)
            .bind(limit)
            .fetch_optional(&self.pool)
            .await?;

        if let Some((window_start_ms, count)) = admitted {
            return Ok(WindowOutcome::Admitted {
                window_start_ms,
                count: count.max(0) as u32,
            });
        }

        // The guard rejected the update: the row exists and is full.
        let window_start_ms = sqlx::query_scalar::<_, i64>(
            "SELECT window_start_ms FROM rate_limits WHERE identifier = $1",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?
        .unwrap_or(now_ms);

        Ok(WindowOutcome::Rejected { window_start_ms })
    }

    async fn reset(&self, identifier: &str) -> Result<(), RateLimitError> {
        sqlx::query("DELETE FROM rate_limits WHERE identifier = $1")
            .bind(identifier)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn prune_expired(&self, now_ms: i64) -> Result<u64, RateLimitError> {
        let result = sqlx::query("DELETE FROM rate_limits WHERE expires_at_ms <= $1")
            .bind(now_ms)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
