//! Override storage seam and the in-memory backend.

use async_trait::async_trait;
use dashmap::DashMap;

use super::PermissionError;
use crate::models::permissions::PermissionOverride;

/// Storage for per-user overrides.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn get_override(
        &self,
        user_id: &str,
        code: &str,
    ) -> Result<Option<PermissionOverride>, PermissionError>;

    async fn list_overrides(&self, user_id: &str) -> Result<Vec<PermissionOverride>, PermissionError>;

    /// Insert or replace the override for `(user_id, permission_code)`.
    async fn upsert_override(&self, entry: &PermissionOverride) -> Result<(), PermissionError>;

    /// Delete the override. Returns whether one existed.
    async fn delete_override(&self, user_id: &str, code: &str) -> Result<bool, PermissionError>;
}

/// DashMap-backed store.
#[derive(Debug, Default)]
pub struct MemoryPermissionStore {
    overrides: DashMap<(String, String), PermissionOverride>,
}

impl MemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn get_override(
        &self,
        user_id: &str,
        code: &str,
    ) -> Result<Option<PermissionOverride>, PermissionError> {
        Ok(self
            .overrides
            .get(&(user_id.to_string(), code.to_string()))
            .map(|o| o.clone()))
    }

    async fn list_overrides(&self, user_id: &str) -> Result<Vec<PermissionOverride>, PermissionError> {
        let mut list: Vec<_> = self
            .overrides
            .iter()
            .filter(|e| e.key().0 == user_id)
            .map(|e| e.value().clone())
            .collect();
        list.sort_by(|a, b| a.permission_code.cmp(&b.permission_code));
        Ok(list)
    }

    async fn upsert_override(&self, entry: &PermissionOverride) -> Result<(), PermissionError> {
        self.overrides.insert(
            (entry.user_id.clone(), entry.permission_code.clone()),
            entry.clone(),
        );
        Ok(())
    }

    async fn delete_override(&self, user_id: &str, code: &str) -> Result<bool, PermissionError> {
        Ok(self
            .overrides
            .remove(&(user_id.to_string(), code.to_string()))
            .is_some())
    }
}
