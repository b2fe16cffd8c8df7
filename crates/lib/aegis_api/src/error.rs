//! Application error types.

use aegis_core::alerts::AlertError;
use aegis_core::audit::AuditError;
use aegis_core::auth::AuthError;
use aegis_core::crypto::CryptoError;
use aegis_core::permissions::PermissionError;
use aegis_core::rate_limit::RateLimitError;
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Too many requests, retry in {retry_after_ms} ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let rate_limited_message;
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::RateLimited { .. } => {
                rate_limited_message = self.to_string();
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "rate_limited",
                    rate_limited_message.as_str(),
                )
            }
            AppError::ServiceUnavailable(m) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", m.as_str())
            }
            AppError::Internal(detail) => {
                error!(detail = %detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        let mut response = (status, body).into_response();

        if let AppError::RateLimited { retry_after_ms } = self {
            // Retry-After is whole seconds, rounded up.
            let secs = retry_after_ms.div_ceil(1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("row not found".into()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::ServiceUnavailable("database unavailable".into())
            }
            _ => AppError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::CredentialError => AppError::Unauthorized("Invalid credentials".into()),
            AuthError::TokenError(msg) => AppError::Unauthorized(msg),
            AuthError::ValidationError(msg) => AppError::Validation(msg),
            AuthError::DbError(e) => AppError::from(e),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<CryptoError> for AppError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::Validation(msg) => AppError::Validation(msg),
            CryptoError::Configuration(msg) => AppError::ServiceUnavailable(msg),
            CryptoError::Decryption(msg) | CryptoError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<RateLimitError> for AppError {
    fn from(e: RateLimitError) -> Self {
        match e {
            RateLimitError::Store(msg) => AppError::ServiceUnavailable(msg),
            RateLimitError::DbError(e) => AppError::from(e),
        }
    }
}

impl From<AuditError> for AppError {
    fn from(e: AuditError) -> Self {
        match e {
            AuditError::Validation(msg) => AppError::Validation(msg),
            AuditError::Forbidden(msg) => AppError::Forbidden(msg),
            AuditError::Store(msg) => AppError::ServiceUnavailable(msg),
            AuditError::DbError(e) => AppError::from(e),
        }
    }
}

impl From<PermissionError> for AppError {
    fn from(e: PermissionError) -> Self {
        match e {
            PermissionError::Validation(msg) => AppError::Validation(msg),
            PermissionError::Forbidden(msg) => AppError::Forbidden(msg),
            PermissionError::NotFound(msg) => AppError::NotFound(msg),
            PermissionError::Store(msg) => AppError::ServiceUnavailable(msg),
            PermissionError::DbError(e) => AppError::from(e),
            PermissionError::Audit(e) => AppError::from(e),
        }
    }
}

impl From<AlertError> for AppError {
    fn from(e: AlertError) -> Self {
        match e {
            AlertError::Configuration(msg) => AppError::Validation(msg),
            AlertError::Delivery(msg) => AppError::ServiceUnavailable(msg),
            AlertError::Timeout(after) => {
                AppError::ServiceUnavailable(format!("alert delivery timed out after {after:?}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_sets_retry_after_in_seconds() {
        let resp = AppError::RateLimited {
            retry_after_ms: 1_500,
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers().get(RETRY_AFTER).unwrap(), "2");
    }

    #[test]
    fn store_failures_map_to_503() {
        let resp = AppError::from(PermissionError::Store("down".into())).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let resp = AppError::from(PermissionError::Audit(AuditError::Store("down".into())))
            .into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let resp = AppError::Internal("secret detail".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
