//! Static permission catalog.
//!
//! The built-in catalog covers the application's namespaces. A deployment may
//! replace it with a JSON array of definitions at startup.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use super::PermissionError;
use crate::models::auth::Role;
use crate::models::permissions::PermissionDefinition;

/// Permission codes the security core itself checks.
pub mod codes {
    pub const USERS_PERMISSIONS_MANAGE: &str = "users.permissions.manage";
    pub const SECURITY_AUDIT_VIEW: &str = "security.audit.view";
    pub const SECURITY_AUDIT_PURGE: &str = "security.audit.purge";
    pub const SECURITY_ALERTS_SEND: &str = "security.alerts.send";
    pub const SECURITY_RATE_LIMITS_RESET: &str = "security.rate_limits.reset";

    /// Codes that must exist in any loaded catalog.
    pub const REQUIRED: [&str; 5] = [
        USERS_PERMISSIONS_MANAGE,
        SECURITY_AUDIT_VIEW,
        SECURITY_AUDIT_PURGE,
        SECURITY_ALERTS_SEND,
        SECURITY_RATE_LIMITS_RESET,
    ];
}

const BUILTIN: &[(&str, Role, &str)] = &[
    ("users.view", Role::Moderator, "View user accounts"),
    ("users.create", Role::Admin, "Create user accounts"),
    ("users.edit", Role::Admin, "Edit user accounts"),
    ("users.delete", Role::Admin, "Delete user accounts"),
    ("users.roles.manage", Role::SuperAdmin, "Change user roles"),
    (codes::USERS_PERMISSIONS_MANAGE, Role::Admin, "Grant and revoke per-user permissions"),
    ("finance.view", Role::Admin, "View finance records"),
    ("finance.edit", Role::Admin, "Edit finance records"),
    ("quotations.view", Role::User, "View quotations"),
    ("quotations.create", Role::User, "Create quotations"),
    ("quotations.edit", Role::Moderator, "Edit any quotation"),
    ("quotations.delete", Role::Admin, "Delete quotations"),
    ("tools.use", Role::User, "Use generation tools"),
    ("tools.manage", Role::Admin, "Configure generation tools"),
    (codes::SECURITY_AUDIT_VIEW, Role::Admin, "Read the audit log"),
    (codes::SECURITY_AUDIT_PURGE, Role::SuperAdmin, "Run audit retention sweeps"),
    (codes::SECURITY_ALERTS_SEND, Role::Admin, "Send and test security alerts"),
    (codes::SECURITY_RATE_LIMITS_RESET, Role::Admin, "Clear rate limit counters"),
    ("system.settings.view", Role::Admin, "View system settings"),
    ("system.settings.edit", Role::SuperAdmin, "Change system settings"),
];

/// `segment(.segment)+`, each segment `[a-z0-9_]+`.
fn is_valid_code(code: &str) -> bool {
    let mut segments = 0;
    for segment in code.split('.') {
        if segment.is_empty()
            || !segment
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        {
            return false;
        }
        segments += 1;
    }
    segments >= 2
}

/// Immutable set of permission definitions keyed by code.
#[derive(Debug, Clone)]
pub struct PermissionCatalog {
    definitions: BTreeMap<String, PermissionDefinition>,
}

impl PermissionCatalog {
    pub fn builtin() -> Self {
        let definitions = BUILTIN
            .iter()
            .map(|(code, role, description)| {
                (
                    code.to_string(),
                    PermissionDefinition {
                        code: code.to_string(),
                        default_min_role: *role,
                        description: Some(description.to_string()),
                    },
                )
            })
            .collect();
        Self { definitions }
    }

    /// Build from definitions, rejecting malformed or duplicate codes and
    /// catalogs missing any of [`codes::REQUIRED`].
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = PermissionDefinition>,
    ) -> Result<Self, PermissionError> {
        let mut map = BTreeMap::new();
        for def in definitions {
            if !is_valid_code(&def.code) {
                return Err(PermissionError::Validation(format!(
                    "invalid permission code: {:?}",
                    def.code
                )));
            }
            if map.contains_key(&def.code) {
                return Err(PermissionError::Validation(format!(
                    "duplicate permission code: {}",
                    def.code
                )));
            }
            map.insert(def.code.clone(), def);
        }
        if let Some(missing) = codes::REQUIRED.iter().find(|c| !map.contains_key(**c)) {
            return Err(PermissionError::Validation(format!(
                "catalog is missing required permission: {missing}"
            )));
        }
        Ok(Self { definitions: map })
    }

    pub fn from_json(json: &str) -> Result<Self, PermissionError> {
        let defs: Vec<PermissionDefinition> = serde_json::from_str(json)
            .map_err(|e| PermissionError::Validation(format!("invalid permission catalog: {e}")))?;
        Self::from_definitions(defs)
    }

    /// Load a catalog file, or the built-in catalog when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, PermissionError> {
        let Some(path) = path else {
            return Ok(Self::builtin());
        };
        let json = std::fs::read_to_string(path).map_err(|e| {
            PermissionError::Validation(format!("cannot read {}: {e}", path.display()))
        })?;
        let catalog = Self::from_json(&json)?;
        info!(path = %path.display(), count = catalog.len(), "loaded permission catalog");
        Ok(catalog)
    }

    pub fn get(&self, code: &str) -> Option<&PermissionDefinition> {
        self.definitions.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.definitions.contains_key(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for PermissionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
