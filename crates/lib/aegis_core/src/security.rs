// @awa-component: SEC-Core
//
//! The five security components wired over one set of stores.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use crate::alerts::{AlertError, SecurityAlertDispatcher};
use crate::audit::{AuditLogger, AuditStore, MemoryAuditStore, PgAuditStore};
use crate::auth::{MemoryUserStore, PgUserStore, UserStore};
use crate::config::SecurityConfig;
use crate::crypto::{CryptoVault, PasswordPolicy};
use crate::permissions::{
    MemoryPermissionStore, PermissionCatalog, PermissionError, PermissionResolver, PermissionStore,
    PgPermissionStore,
};
use crate::rate_limit::{MemoryRateLimitStore, PgRateLimitStore, RateLimitStore, RateLimiter};

/// Errors raised while assembling the core.
#[derive(Debug, Error)]
pub enum SecurityCoreError {
    #[error("Permission catalog: {0}")]
    Catalog(#[from] PermissionError),

    #[error("Alert channels: {0}")]
    Alerts(#[from] AlertError),
}

/// Storage backends for every component.
#[derive(Clone)]
pub struct CoreStores {
    pub users: Arc<dyn UserStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub audit: Arc<dyn AuditStore>,
    pub rate_limits: Arc<dyn RateLimitStore>,
}

impl CoreStores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserStore::new(pool.clone())),
            permissions: Arc::new(PgPermissionStore::new(pool.clone())),
            audit: Arc::new(PgAuditStore::new(pool.clone())),
            rate_limits: Arc::new(PgRateLimitStore::new(pool)),
        }
    }
}

/// In-memory stores with their concrete types kept, so tests and local
/// tooling can seed and inspect them.
#[derive(Default, Clone)]
pub struct MemoryStores {
    pub users: Arc<MemoryUserStore>,
    pub permissions: Arc<MemoryPermissionStore>,
    pub audit: Arc<MemoryAuditStore>,
    pub rate_limits: Arc<MemoryRateLimitStore>,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn core_stores(&self) -> CoreStores {
        CoreStores {
            users: self.users.clone(),
            permissions: self.permissions.clone(),
            audit: self.audit.clone(),
            rate_limits: self.rate_limits.clone(),
        }
    }
}

/// Shared handle to every security component.
#[derive(Clone)]
pub struct SecurityCore {
    pub config: Arc<SecurityConfig>,
    pub vault: Arc<CryptoVault>,
    pub rate_limiter: Arc<RateLimiter>,
    pub permissions: Arc<PermissionResolver>,
    pub audit: AuditLogger,
    pub alerts: SecurityAlertDispatcher,
    pub users: Arc<dyn UserStore>,
}

impl SecurityCore {
    pub fn with_stores(config: SecurityConfig, stores: CoreStores) -> Result<Self, SecurityCoreError> {
        let catalog = PermissionCatalog::load(config.permission_catalog_path.as_deref())?;
        let alerts = SecurityAlertDispatcher::from_config(&config.alerts)?;
        let audit = AuditLogger::new(stores.audit);
        let permissions = PermissionResolver::new(
            Arc::new(catalog),
            stores.permissions,
            stores.users.clone(),
            audit.clone(),
        );

        info!(
            mode = ?config.mode,
            permissions = permissions.catalog().len(),
            alert_channels = ?alerts.channel_names(),
            "security core ready"
        );

        Ok(Self {
            vault: Arc::new(CryptoVault::new(&config)),
            rate_limiter: Arc::new(RateLimiter::new(stores.rate_limits, config.rate_limits.clone())),
            permissions: Arc::new(permissions),
            audit,
            alerts,
            users: stores.users,
            config: Arc::new(config),
        })
    }

    pub fn postgres(pool: PgPool, config: SecurityConfig) -> Result<Self, SecurityCoreError> {
        Self::with_stores(config, CoreStores::postgres(pool))
    }

    /// Single-process core with fresh in-memory stores.
    pub fn in_memory(config: SecurityConfig) -> Result<Self, SecurityCoreError> {
        Self::with_stores(config, MemoryStores::new().core_stores())
    }

    /// Replace the password hashing policy.
    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.vault = Arc::new(CryptoVault::new(&self.config).with_policy(policy));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audit::{AuditAction, AuditCategory, NewAuditEntry};
    use crate::models::auth::{Role, Session};
    use crate::audit::AuditCaller;

    #[tokio::test]
    async fn components_share_stores() {
        let stores = MemoryStores::new();
        stores.users.put_role("admin", Role::Admin);
        stores.users.put_role("user", Role::User);
        let core = SecurityCore::with_stores(SecurityConfig::default(), stores.core_stores()).unwrap();

        core.permissions
            .grant(&Session::new("admin", Role::Admin), "user", "finance.view")
            .await
            .unwrap();
        core.audit
            .record(
                NewAuditEntry::new(AuditAction::ToolUsed, AuditCategory::Tools),
                &AuditCaller::System,
            )
            .await
            .unwrap();

        let actions: Vec<_> = stores.audit.all().await.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![AuditAction::PermissionGranted, AuditAction::ToolUsed]
        );
    }

    #[test]
    fn bad_catalog_path_fails_construction() {
        let config = SecurityConfig {
            permission_catalog_path: Some("/nonexistent/catalog.json".into()),
            ..SecurityConfig::default()
        };
        assert!(matches!(
            SecurityCore::in_memory(config),
            Err(SecurityCoreError::Catalog(_))
        ));
    }
}
