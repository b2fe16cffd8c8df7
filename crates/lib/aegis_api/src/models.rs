//! Request and response bodies.
//!
//! Wire names are camelCase. Domain types from `aegis_core::models` that are
//! already serializable are returned as-is.

use std::collections::BTreeMap;

use aegis_core::models::auth::Role;
use aegis_core::models::permissions::{Decision, EffectivePermission, PermissionOverride};
use aegis_core::models::rate_limit::{OperationClass, StoreFailurePolicy};
use serde::{Deserialize, Serialize};

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub version: String,
    pub db_connected: bool,
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub name: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    pub user: AuthUser,
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

fn fail_closed() -> StoreFailurePolicy {
    StoreFailurePolicy::FailClosed
}

/// Either an explicit `(identifier, limit, window)` check or a check against
/// a configured operation class.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RateLimitCheckRequest {
    #[serde(rename_all = "camelCase")]
    Explicit {
        identifier: String,
        limit: u32,
        window_ms: u64,
        #[serde(default = "fail_closed")]
        on_store_error: StoreFailurePolicy,
    },
    Class {
        class: OperationClass,
        subject: String,
    },
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionCheckResponse {
    pub code: String,
    pub allowed: bool,
    pub decision: Decision,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPermissionsResponse {
    pub user_id: String,
    pub role: Role,
    pub permissions: BTreeMap<String, EffectivePermission>,
    pub overrides: Vec<PermissionOverride>,
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuditLogRequest {
    pub action: String,
    pub category: String,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub target_type: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Query string for `GET /admin/audit-logs`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogQuery {
    pub category: Option<String>,
    pub action: Option<String>,
    pub user_id: Option<String>,
    pub target_id: Option<String>,
    pub from: Option<chrono::DateTime<chrono::Utc>>,
    pub to: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub unread_only: bool,
    pub before: Option<i64>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkReadRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub updated: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeRequest {
    pub older_than_days: u32,
    #[serde(default)]
    pub only_read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeResponse {
    pub deleted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_check_accepts_both_shapes() {
        let explicit: RateLimitCheckRequest = serde_json::from_str(
            r#"{"identifier":"contact:1.2.3.4","limit":3,"windowMs":60000}"#,
        )
        .unwrap();
        assert!(matches!(
            explicit,
            RateLimitCheckRequest::Explicit {
                on_store_error: StoreFailurePolicy::FailClosed,
                ..
            }
        ));

        let class: RateLimitCheckRequest =
            serde_json::from_str(r#"{"class":"mfa","subject":"user-1"}"#).unwrap();
        assert!(matches!(
            class,
            RateLimitCheckRequest::Class {
                class: OperationClass::Mfa,
                ..
            }
        ));
    }
}
