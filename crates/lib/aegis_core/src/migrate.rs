//! Database migration support.
//!
//! Embeds and runs SQL migrations from `aegis_core/migrations/`: users,
//! permission overrides, rate limit windows and the audit log.

use sqlx::PgPool;
use tracing::info;

/// Run all embedded database migrations against the given pool.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    let migrator = sqlx::migrate!("./migrations");
    info!(count = migrator.iter().count(), "applying database migrations");
    migrator.run(pool).await
}
