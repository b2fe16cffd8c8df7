//! Permission domain models.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::auth::Role;

/// Catalog entry: a permission code and the lowest role that holds it by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionDefinition {
    pub code: String,
    pub default_min_role: Role,
    #[serde(default)]
    pub description: Option<String>,
}

/// State of an active per-user override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideState {
    Granted,
    Revoked,
}

impl OverrideState {
    /// Database text representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideState::Granted => "granted",
            OverrideState::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "granted" => Some(OverrideState::Granted),
            "revoked" => Some(OverrideState::Revoked),
            _ => None,
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, OverrideState::Granted)
    }
}

impl fmt::Display for OverrideState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-user exception to the role default. At most one per `(user_id, permission_code)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionOverride {
    pub user_id: String,
    pub permission_code: String,
    pub state: OverrideState,
    /// Actor who granted or revoked.
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
}

/// Where an effective permission outcome came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionSource {
    Role,
    Override,
}

/// One row of a user's effective permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermission {
    pub granted: bool,
    pub source: PermissionSource,
}

/// Why a permission check was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The role is below the permission's default minimum role.
    RoleTooLow,
    /// An override revokes the permission for this user.
    Revoked,
    /// The code is not in the catalog.
    UnknownPermission,
}

/// Outcome of a single authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "lowercase")]
pub enum Decision {
    Allowed,
    Denied(DenialReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Mutation applied to an override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideChange {
    Grant,
    Revoke,
    Reset,
}

impl OverrideChange {
    /// Override state this change leaves behind (`None` = back to role default).
    pub fn resulting_state(&self) -> Option<OverrideState> {
        match self {
            OverrideChange::Grant => Some(OverrideState::Granted),
            OverrideChange::Revoke => Some(OverrideState::Revoked),
            OverrideChange::Reset => None,
        }
    }
}
