//! Health endpoint.

use axum::Json;
use axum::extract::State;
use tracing::warn;

use crate::AppState;
use crate::error::AppResult;
use crate::models::HealthResponse;

/// `GET /health`: reports the core version and PostgreSQL reachability.
pub async fn health(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let db_connected = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => true,
        Err(e) => {
            warn!("Database health check failed: {e}");
            false
        }
    };

    Ok(Json(HealthResponse {
        version: aegis_core::version().to_string(),
        db_connected,
    }))
}
