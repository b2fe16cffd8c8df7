// @awa-component: SEC-AlertHandler
//
//! Security alert handlers.

use aegis_core::models::alerts::{DispatchReport, SecurityAlert};
use aegis_core::permissions::codes;
use axum::Json;
use axum::extract::State;
use tracing::info;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::services::access::Access;

/// `POST /admin/security/alerts`: fan an alert out and report per-channel outcomes.
pub async fn send_handler(
    State(state): State<AppState>,
    mut access: Access,
    Json(alert): Json<SecurityAlert>,
) -> AppResult<Json<DispatchReport>> {
    access.require(codes::SECURITY_ALERTS_SEND).await?;
    if alert.title.trim().is_empty() {
        return Err(AppError::Validation("alert title must not be empty".into()));
    }

    info!(
        severity = %alert.severity,
        alert_type = %alert.alert_type,
        by = %access.session().user_id,
        "security alert requested"
    );
    Ok(Json(state.core.alerts.dispatch(&alert).await))
}

/// `POST /admin/security/alerts/test`: send a test alert to every channel.
pub async fn test_handler(
    State(state): State<AppState>,
    mut access: Access,
) -> AppResult<Json<DispatchReport>> {
    access.require(codes::SECURITY_ALERTS_SEND).await?;
    Ok(Json(state.core.alerts.self_test().await))
}
