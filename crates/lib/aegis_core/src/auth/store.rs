//! User directory seam: PostgreSQL and in-memory backends.

use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sqlx::PgPool;

use super::{AuthError, queries};
use crate::models::auth::{Role, UserAccount};
use crate::uuid::uuidv7;

/// Role for a new account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleAssignment {
    Exactly(Role),
    /// Superadmin if the directory is empty, otherwise `User`. Decided
    /// atomically with the insert.
    Bootstrap,
}

impl RoleAssignment {
    fn resolve(self, directory_empty: bool) -> Role {
        match self {
            RoleAssignment::Exactly(role) => role,
            RoleAssignment::Bootstrap if directory_empty => Role::SuperAdmin,
            RoleAssignment::Bootstrap => Role::User,
        }
    }
}

/// Fields for a new account. The email arrives already sealed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email_encrypted: String,
    pub email_hash: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub role: RoleAssignment,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email_hash(&self, email_hash: &str) -> Result<Option<UserAccount>, AuthError>;

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserAccount>, AuthError>;

    /// Create an account. `ValidationError` if the email is already
    /// registered. The duplicate check, the bootstrap role decision and the
    /// insert are one atomic step.
    async fn create(&self, user: NewUser) -> Result<UserAccount, AuthError>;

    async fn update_password_hash(&self, user_id: &str, password_hash: &str) -> Result<(), AuthError>;

    /// Stored role, `None` for an unknown user.
    async fn role_of(&self, user_id: &str) -> Result<Option<Role>, AuthError> {
        Ok(self.find_by_id(user_id).await?.map(|u| u.role))
    }
}

/// Store backed by the `users` table.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email_hash(&self, email_hash: &str) -> Result<Option<UserAccount>, AuthError> {
        queries::find_user_by_email_hash(&self.pool, email_hash).await
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserAccount>, AuthError> {
        queries::find_user_by_id(&self.pool, user_id).await
    }

    async fn create(&self, user: NewUser) -> Result<UserAccount, AuthError> {
        let (role, bootstrap) = match user.role {
            RoleAssignment::Exactly(role) => (role, false),
            RoleAssignment::Bootstrap => (Role::User, true),
        };
        queries::create_user(
            &self.pool,
            &user.email_encrypted,
            &user.email_hash,
            user.name.as_deref(),
            &user.password_hash,
            role,
            bootstrap,
        )
        .await
    }

    async fn update_password_hash(&self, user_id: &str, password_hash: &str) -> Result<(), AuthError> {
        queries::update_password_hash(&self.pool, user_id, password_hash).await
    }
}

/// In-memory directory keyed by user id, with a lookup-hash index.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: DashMap<String, UserAccount>,
    by_email_hash: DashMap<String, String>,
    create_lock: Mutex<()>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account as-is.
    pub fn put(&self, account: UserAccount) {
        self.by_email_hash
            .insert(account.email_hash.clone(), account.id.clone());
        self.users.insert(account.id.clone(), account);
    }

    /// Register a bare account with only an id and a role.
    pub fn put_role(&self, user_id: impl Into<String>, role: Role) {
        let id = user_id.into();
        self.put(UserAccount {
            email_encrypted: String::new(),
            email_hash: format!("unset:{id}"),
            name: None,
            password_hash: None,
            role,
            id,
        });
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email_hash(&self, email_hash: &str) -> Result<Option<UserAccount>, AuthError> {
        let Some(id) = self.by_email_hash.get(email_hash).map(|id| id.value().clone()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserAccount>, AuthError> {
        Ok(self.users.get(user_id).map(|u| u.value().clone()))
    }

    async fn create(&self, user: NewUser) -> Result<UserAccount, AuthError> {
        // Held across the emptiness check and both inserts; never across an await.
        let _guard = self
            .create_lock
            .lock()
            .map_err(|_| AuthError::Internal("user store lock poisoned".into()))?;

        let role = user.role.resolve(self.users.is_empty());
        let slot = match self.by_email_hash.entry(user.email_hash.clone()) {
            Entry::Occupied(_) => {
                return Err(AuthError::ValidationError("email already registered".into()));
            }
            Entry::Vacant(slot) => slot,
        };

        let account = UserAccount {
            id: uuidv7().to_string(),
            email_encrypted: user.email_encrypted,
            email_hash: user.email_hash,
            name: user.name,
            password_hash: Some(user.password_hash),
            role,
        };
        slot.insert(account.id.clone());
        self.users.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    async fn update_password_hash(&self, user_id: &str, password_hash: &str) -> Result<(), AuthError> {
        match self.users.get_mut(user_id) {
            Some(mut user) => {
                user.password_hash = Some(password_hash.to_string());
                Ok(())
            }
            None => Err(AuthError::ValidationError(format!("unknown user {user_id}"))),
        }
    }
}
