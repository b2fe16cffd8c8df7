// @awa-component: SEC-RateLimitHandler
//
//! Rate limit check and reset handlers.

use aegis_core::audit::AuditCaller;
use aegis_core::models::audit::{AuditAction, AuditCategory, NewAuditEntry};
use aegis_core::models::rate_limit::{OperationClass, RateLimitDecision};
use aegis_core::permissions::codes;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use aegis_core::rate_limit::MAX_WINDOW_MS;
use tracing::{info, warn};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::RateLimitCheckRequest;
use crate::services::access::{Access, ClientOrigin};

/// `POST /security/rate-limit/check`: count one operation and report the decision.
///
/// A denied decision is still a 200; callers branch on `allowed`.
///
/// Buckets the server enforces itself are off limits: explicit identifiers
/// may not use a class namespace, `login` and `register` cannot be counted
/// through here, and `mfa` / `redemption` only for the caller's own id.
pub async fn check_handler(
    State(state): State<AppState>,
    access: Access,
    Json(body): Json<RateLimitCheckRequest>,
) -> AppResult<Json<RateLimitDecision>> {
    let limiter = &state.core.rate_limiter;
    let decision = match body {
        RateLimitCheckRequest::Explicit {
            identifier,
            limit,
            window_ms,
            on_store_error,
        } => {
            if identifier.trim().is_empty() {
                return Err(AppError::Validation("identifier must not be empty".into()));
            }
            if window_ms == 0 || window_ms > MAX_WINDOW_MS {
                return Err(AppError::Validation(format!(
                    "windowMs must be between 1 and {MAX_WINDOW_MS}"
                )));
            }
            if let Some(class) = OperationClass::of_identifier(&identifier) {
                warn!(identifier, by = %access.session().user_id, "explicit check in reserved namespace");
                return Err(AppError::Validation(format!(
                    "identifiers under '{}:' are reserved; use the class form",
                    class.as_str()
                )));
            }
            limiter
                .check_and_increment(&identifier, limit, window_ms, on_store_error)
                .await
        }
        RateLimitCheckRequest::Class { class, subject } => {
            if subject.trim().is_empty() {
                return Err(AppError::Validation("subject must not be empty".into()));
            }
            if class.is_server_owned() {
                return Err(AppError::Validation(format!(
                    "{} attempts are counted by the server",
                    class.as_str()
                )));
            }
            let per_account = matches!(class, OperationClass::Mfa | OperationClass::Redemption);
            if per_account && subject != access.session().user_id {
                return Err(AppError::Forbidden(format!(
                    "{} checks are limited to the caller's own account",
                    class.as_str()
                )));
            }
            limiter.check_policy(class, &subject).await
        }
    };
    Ok(Json(decision))
}

/// `DELETE /security/rate-limit/{identifier}`: clear throttling for an identifier.
pub async fn reset_handler(
    State(state): State<AppState>,
    mut access: Access,
    ClientOrigin(origin): ClientOrigin,
    Path(identifier): Path<String>,
) -> AppResult<StatusCode> {
    access.require(codes::SECURITY_RATE_LIMITS_RESET).await?;
    state.core.rate_limiter.reset(&identifier).await?;

    state
        .core
        .audit
        .record(
            NewAuditEntry::new(AuditAction::RateLimitReset, AuditCategory::Security)
                .target("rate_limit", identifier.clone())
                .origin(origin),
            &AuditCaller::User(access.session().clone()),
        )
        .await?;

    info!(identifier, by = %access.session().user_id, "rate limit reset");
    Ok(StatusCode::NO_CONTENT)
}
