//! Effective-permission resolution and override mutation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::PermissionError;
use super::catalog::{PermissionCatalog, codes};
use super::store::PermissionStore;
use crate::audit::{AuditCaller, AuditLogger};
use crate::auth::UserStore;
use crate::models::audit::{AuditAction, AuditCategory, NewAuditEntry};
use crate::models::auth::{Role, Session};
use crate::models::permissions::{
    Decision, DenialReason, EffectivePermission, OverrideChange, OverrideState, PermissionOverride,
    PermissionSource,
};

/// Memo of decisions for a single request. Create one per request and pass it
/// down the call chain; never share it across requests.
#[derive(Debug, Default)]
pub struct RequestPermissionCache {
    decisions: HashMap<(String, Role, String), Decision>,
}

impl RequestPermissionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

/// Resolves `(user, role, permission)` against the catalog and per-user
/// overrides, and applies audited override changes.
pub struct PermissionResolver {
    catalog: Arc<PermissionCatalog>,
    store: Arc<dyn PermissionStore>,
    users: Arc<dyn UserStore>,
    audit: AuditLogger,
}

fn role_default(role: Role, min_role: Role) -> Decision {
    if role.includes(min_role) {
        Decision::Allowed
    } else {
        Decision::Denied(DenialReason::RoleTooLow)
    }
}

impl PermissionResolver {
    pub fn new(
        catalog: Arc<PermissionCatalog>,
        store: Arc<dyn PermissionStore>,
        users: Arc<dyn UserStore>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            catalog,
            store,
            users,
            audit,
        }
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    /// Authorization decision. SUPERADMIN is allowed without a lookup;
    /// otherwise an override wins outright, else the role default applies.
    pub async fn resolve(&self, user_id: &str, role: Role, code: &str) -> Result<Decision, PermissionError> {
        let Some(definition) = self.catalog.get(code) else {
            return Ok(Decision::Denied(DenialReason::UnknownPermission));
        };
        if role == Role::SuperAdmin {
            return Ok(Decision::Allowed);
        }
        match self.store.get_override(user_id, code).await? {
            Some(o) if o.state.is_granted() => Ok(Decision::Allowed),
            Some(_) => Ok(Decision::Denied(DenialReason::Revoked)),
            None => Ok(role_default(role, definition.default_min_role)),
        }
    }

    pub async fn has(&self, user_id: &str, role: Role, code: &str) -> Result<bool, PermissionError> {
        Ok(self.resolve(user_id, role, code).await?.is_allowed())
    }

    /// [`PermissionResolver::resolve`] memoized in a request-scoped cache.
    pub async fn resolve_cached(
        &self,
        cache: &mut RequestPermissionCache,
        user_id: &str,
        role: Role,
        code: &str,
    ) -> Result<Decision, PermissionError> {
        let key = (user_id.to_string(), role, code.to_string());
        if let Some(decision) = cache.decisions.get(&key) {
            return Ok(*decision);
        }
        let decision = self.resolve(user_id, role, code).await?;
        cache.decisions.insert(key, decision);
        Ok(decision)
    }

    /// Every catalog permission for the user, consistent with [`PermissionResolver::resolve`].
    pub async fn effective_permissions(
        &self,
        user_id: &str,
        role: Role,
    ) -> Result<BTreeMap<String, EffectivePermission>, PermissionError> {
        let overrides: HashMap<String, OverrideState> = if role == Role::SuperAdmin {
            HashMap::new()
        } else {
            self.store
                .list_overrides(user_id)
                .await?
                .into_iter()
                .map(|o| (o.permission_code, o.state))
                .collect()
        };

        Ok(self
            .catalog
            .iter()
            .map(|def| {
                let effective = match overrides.get(&def.code) {
                    Some(state) => EffectivePermission {
                        granted: state.is_granted(),
                        source: PermissionSource::Override,
                    },
                    None => EffectivePermission {
                        granted: role_default(role, def.default_min_role).is_allowed(),
                        source: PermissionSource::Role,
                    },
                };
                (def.code.clone(), effective)
            })
            .collect())
    }

    pub async fn list_overrides(&self, user_id: &str) -> Result<Vec<PermissionOverride>, PermissionError> {
        self.store.list_overrides(user_id).await
    }

    /// Role of a stored user, `NotFound` if absent.
    pub async fn user_role(&self, user_id: &str) -> Result<Role, PermissionError> {
        self.users
            .role_of(user_id)
            .await
            .map_err(|e| PermissionError::Store(e.to_string()))?
            .ok_or_else(|| PermissionError::NotFound(format!("user {user_id}")))
    }

    pub async fn grant(&self, actor: &Session, target_user_id: &str, code: &str) -> Result<(), PermissionError> {
        self.apply(actor, target_user_id, code, OverrideChange::Grant).await
    }

    pub async fn revoke(&self, actor: &Session, target_user_id: &str, code: &str) -> Result<(), PermissionError> {
        self.apply(actor, target_user_id, code, OverrideChange::Revoke).await
    }

    /// Delete the override so the role default applies again.
    pub async fn reset(&self, actor: &Session, target_user_id: &str, code: &str) -> Result<(), PermissionError> {
        self.apply(actor, target_user_id, code, OverrideChange::Reset).await
    }

    async fn apply(
        &self,
        actor: &Session,
        target_user_id: &str,
        code: &str,
        change: OverrideChange,
    ) -> Result<(), PermissionError> {
        let definition = self
            .catalog
            .get(code)
            .ok_or_else(|| PermissionError::Validation(format!("unknown permission: {code}")))?;
        let target_role = self.user_role(target_user_id).await?;

        if target_role == Role::SuperAdmin {
            return Err(PermissionError::Forbidden(
                "superadmin permissions cannot be modified".into(),
            ));
        }

        if actor.user_id == target_user_id && code == codes::USERS_PERMISSIONS_MANAGE {
            let keeps_access = match change.resulting_state() {
                Some(state) => state.is_granted(),
                None => target_role.includes(definition.default_min_role),
            };
            if !keeps_access {
                return Err(PermissionError::Forbidden(
                    "cannot remove your own permission management access".into(),
                ));
            }
        }

        if !self
            .has(&actor.user_id, actor.role, codes::USERS_PERMISSIONS_MANAGE)
            .await?
        {
            return Err(PermissionError::Forbidden(format!(
                "{} is required",
                codes::USERS_PERMISSIONS_MANAGE
            )));
        }

        if actor.role != Role::SuperAdmin && actor.role <= target_role {
            return Err(PermissionError::Forbidden(format!(
                "a {} cannot manage a {}",
                actor.role, target_role
            )));
        }

        let previous = self
            .store
            .get_override(target_user_id, code)
            .await?
            .map(|o| o.state);

        match change.resulting_state() {
            Some(state) => {
                self.store
                    .upsert_override(&PermissionOverride {
                        user_id: target_user_id.to_string(),
                        permission_code: code.to_string(),
                        state,
                        changed_by: actor.user_id.clone(),
                        changed_at: Utc::now(),
                    })
                    .await?
            }
            None => {
                self.store.delete_override(target_user_id, code).await?;
            }
        }

        let action = match change {
            OverrideChange::Grant => AuditAction::PermissionGranted,
            OverrideChange::Revoke => AuditAction::PermissionRevoked,
            OverrideChange::Reset => AuditAction::PermissionReset,
        };
        info!(
            actor = %actor.user_id,
            target = %target_user_id,
            permission = code,
            %action,
            "permission override changed"
        );

        let entry = NewAuditEntry::new(action, AuditCategory::Admin)
            .target("user", target_user_id)
            .meta("permission", code)
            .meta(
                "previousState",
                previous.map_or("default", |s| s.as_str()),
            );
        if let Err(e) = self.audit.record(entry, &AuditCaller::User(actor.clone())).await {
            warn!(error = %e, permission = code, "override changed but audit write failed");
            return Err(e.into());
        }
        Ok(())
    }
}
