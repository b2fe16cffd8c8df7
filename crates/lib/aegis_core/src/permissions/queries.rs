//! Permission-related database queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::PermissionError;
use super::store::PermissionStore;
use crate::models::permissions::{OverrideState, PermissionOverride};

type OverrideRow = (String, String, String, String, DateTime<Utc>);

fn from_row(row: OverrideRow) -> Result<PermissionOverride, PermissionError> {
    let (user_id, permission_code, state, changed_by, changed_at) = row;
    let state = OverrideState::parse(&state)
        .ok_or_else(|| PermissionError::Store(format!("unknown override state: {state}")))?;
    Ok(PermissionOverride {
        user_id,
        permission_code,
        state,
        changed_by,
        changed_at,
    })
}

/// Store backed by the `permission_overrides` table.
#[derive(Debug, Clone)]
pub struct PgPermissionStore {
    pool: PgPool,
}

impl PgPermissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionStore for PgPermissionStore {
    async fn get_override(
        &self,
        user_id: &str,
        code: &str,
    ) -> Result<Option<PermissionOverride>, PermissionError> {
        let Ok(id) = user_id.parse::<uuid::Uuid>() else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, OverrideRow>(
            "SELECT user_id::text, permission_code, state, changed_by, changed_at \
             FROM permission_overrides WHERE user_id = $1 AND permission_code = $2",
        )
        .bind(id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.map(from_row).transpose()
    }

    async fn list_overrides(&self, user_id: &str) -> Result<Vec<PermissionOverride>, PermissionError> {
        let Ok(id) = user_id.parse::<uuid::Uuid>() else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query_as::<_, OverrideRow>(
            "SELECT user_id::text, permission_code, state, changed_by, changed_at \
             FROM permission_overrides WHERE user_id = $1 ORDER BY permission_code",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(from_row).collect()
    }

    async fn upsert_override(&self, entry: &PermissionOverride) -> Result<(), PermissionError> {
        let id = entry
            .user_id
            .parse::<uuid::Uuid>()
            .map_err(|_| PermissionError::NotFound(format!("user {}", entry.user_id)))?;
        sqlx::query(
            "INSERT INTO permission_overrides (user_id, permission_code, state, changed_by, changed_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id, permission_code) DO UPDATE SET \
             state = EXCLUDED.state, changed_by = EXCLUDED.changed_by, changed_at = EXCLUDED.changed_at",
        )
        .bind(id)
        .bind(&entry.permission_code)
        .bind(entry.state.as_str())
        .bind(&entry.changed_by)
        .bind(entry.changed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_override(&self, user_id: &str, code: &str) -> Result<bool, PermissionError> {
        let Ok(id) = user_id.parse::<uuid::Uuid>() else {
            return Ok(false);
        };
        let result = sqlx::query(
            "DELETE FROM permission_overrides WHERE user_id = $1 AND permission_code = $2",
        )
        .bind(id)
        .bind(code)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
