//! Audit log domain models.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of audit categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditCategory {
    Auth,
    Users,
    Security,
    Tools,
    Quotations,
    System,
    Admin,
}

impl AuditCategory {
    pub const ALL: [AuditCategory; 7] = [
        AuditCategory::Auth,
        AuditCategory::Users,
        AuditCategory::Security,
        AuditCategory::Tools,
        AuditCategory::Quotations,
        AuditCategory::System,
        AuditCategory::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditCategory::Auth => "auth",
            AuditCategory::Users => "users",
            AuditCategory::Security => "security",
            AuditCategory::Tools => "tools",
            AuditCategory::Quotations => "quotations",
            AuditCategory::System => "system",
            AuditCategory::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        AuditCategory::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// Writes in these categories must complete before the triggering
    /// request's response is finalized.
    pub fn is_security_critical(&self) -> bool {
        matches!(
            self,
            AuditCategory::Auth | AuditCategory::Users | AuditCategory::Security | AuditCategory::Admin
        )
    }
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed catalog of audit actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // auth
    LoginSuccess,
    LoginFailed,
    Logout,
    MfaVerified,
    MfaFailed,
    PasswordChanged,
    PasswordResetRequested,
    PasswordRehashed,
    AccountRegistered,
    // users
    UserCreated,
    UserUpdated,
    UserDeleted,
    RoleChanged,
    // security
    RateLimitExceeded,
    SuspiciousActivity,
    DecryptionFailed,
    // tools / quotations
    ToolUsed,
    QuotationCreated,
    QuotationUpdated,
    QuotationDeleted,
    // admin / system
    PermissionGranted,
    PermissionRevoked,
    PermissionReset,
    RateLimitReset,
    SettingsChanged,
    AuditPurged,
}

impl AuditAction {
    pub const ALL: [AuditAction; 26] = [
        AuditAction::LoginSuccess,
        AuditAction::LoginFailed,
        AuditAction::Logout,
        AuditAction::MfaVerified,
        AuditAction::MfaFailed,
        AuditAction::PasswordChanged,
        AuditAction::PasswordResetRequested,
        AuditAction::PasswordRehashed,
        AuditAction::AccountRegistered,
        AuditAction::UserCreated,
        AuditAction::UserUpdated,
        AuditAction::UserDeleted,
        AuditAction::RoleChanged,
        AuditAction::RateLimitExceeded,
        AuditAction::SuspiciousActivity,
        AuditAction::DecryptionFailed,
        AuditAction::ToolUsed,
        AuditAction::QuotationCreated,
        AuditAction::QuotationUpdated,
        AuditAction::QuotationDeleted,
        AuditAction::PermissionGranted,
        AuditAction::PermissionRevoked,
        AuditAction::PermissionReset,
        AuditAction::RateLimitReset,
        AuditAction::SettingsChanged,
        AuditAction::AuditPurged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::LoginSuccess => "login_success",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::Logout => "logout",
            AuditAction::MfaVerified => "mfa_verified",
            AuditAction::MfaFailed => "mfa_failed",
            AuditAction::PasswordChanged => "password_changed",
            AuditAction::PasswordResetRequested => "password_reset_requested",
            AuditAction::PasswordRehashed => "password_rehashed",
            AuditAction::AccountRegistered => "account_registered",
            AuditAction::UserCreated => "user_created",
            AuditAction::UserUpdated => "user_updated",
            AuditAction::UserDeleted => "user_deleted",
            AuditAction::RoleChanged => "role_changed",
            AuditAction::RateLimitExceeded => "rate_limit_exceeded",
            AuditAction::SuspiciousActivity => "suspicious_activity",
            AuditAction::DecryptionFailed => "decryption_failed",
            AuditAction::ToolUsed => "tool_used",
            AuditAction::QuotationCreated => "quotation_created",
            AuditAction::QuotationUpdated => "quotation_updated",
            AuditAction::QuotationDeleted => "quotation_deleted",
            AuditAction::PermissionGranted => "permission_granted",
            AuditAction::PermissionRevoked => "permission_revoked",
            AuditAction::PermissionReset => "permission_reset",
            AuditAction::RateLimitReset => "rate_limit_reset",
            AuditAction::SettingsChanged => "settings_changed",
            AuditAction::AuditPurged => "audit_purged",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        AuditAction::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request origin captured by the transport layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOrigin {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// An audit entry about to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub action: AuditAction,
    pub category: AuditCategory,
    pub user_id: Option<String>,
    pub target_id: Option<String>,
    pub target_type: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub origin: RequestOrigin,
}

impl NewAuditEntry {
    pub fn new(action: AuditAction, category: AuditCategory) -> Self {
        Self {
            action,
            category,
            user_id: None,
            target_id: None,
            target_type: None,
            metadata: serde_json::Map::new(),
            origin: RequestOrigin::default(),
        }
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn target(mut self, target_type: impl Into<String>, target_id: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self.target_id = Some(target_id.into());
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn origin(mut self, origin: RequestOrigin) -> Self {
        self.origin = origin;
        self
    }
}

/// A persisted audit entry. There is no update API for any of these fields
/// other than `read_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: i64,
    pub action: AuditAction,
    pub category: AuditCategory,
    pub user_id: Option<String>,
    pub target_id: Option<String>,
    pub target_type: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Filters for the audit read path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFilter {
    pub category: Option<AuditCategory>,
    pub action: Option<AuditAction>,
    pub user_id: Option<String>,
    pub target_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_only: bool,
}

impl AuditFilter {
    /// In-process evaluation of the filter (used by the in-memory store).
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.category.is_none_or(|c| c == entry.category)
            && self.action.is_none_or(|a| a == entry.action)
            && self
                .user_id
                .as_deref()
                .is_none_or(|u| entry.user_id.as_deref() == Some(u))
            && self
                .target_id
                .as_deref()
                .is_none_or(|t| entry.target_id.as_deref() == Some(t))
            && self.from.is_none_or(|from| entry.created_at >= from)
            && self.to.is_none_or(|to| entry.created_at < to)
            && (!self.unread_only || entry.read_at.is_none())
    }
}

/// Keyset pagination request: entries with `id < before`, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub before: Option<i64>,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            before: None,
            limit: 50,
        }
    }
}

/// One page of audit entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditPage {
    pub entries: Vec<AuditLogEntry>,
    /// Pass as `before` to fetch the next page; `None` when exhausted.
    pub next_cursor: Option<i64>,
}

/// Bulk retention sweep: by age and optionally read status, never by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionSweep {
    pub older_than: DateTime<Utc>,
    pub only_read: bool,
}
