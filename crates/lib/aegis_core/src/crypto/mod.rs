// @awa-component: SEC-CryptoVault
//
//! PII encryption, lookup hashing and password hashing.
//!
//! Key material is read from [`SecurityConfig`] once. Its absence is only
//! checked when an operation needs it: production fails with
//! [`CryptoError::Configuration`] at first use, development falls back to a
//! fixed dev key (and no pepper) with a warning.

pub mod cipher;
pub mod password;

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{error, warn};
use zeroize::Zeroizing;

use crate::config::{DeploymentMode, Secret, SecurityConfig};
pub use cipher::{EncryptedField, normalize};
pub use password::{PasswordPolicy, PasswordVerification};

/// Input hashed once to give absent accounts something to verify against.
const ABSENT_ACCOUNT_SEED: &str = "aegis-absent-account";

/// Development-only fallback key material.
const DEV_ENCRYPTION_KEY: &str = "aegis-default-dev-key-change-in-production";

/// Cryptography errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Crypto error: {0}")]
    Internal(String),
}

/// Encryption, lookup hashing and password hashing behind one handle.
#[derive(Debug)]
pub struct CryptoVault {
    mode: DeploymentMode,
    encryption_key: Option<Secret>,
    pepper: Option<Secret>,
    policy: PasswordPolicy,
    warned_dev_key: AtomicBool,
    warned_no_pepper: AtomicBool,
    absent_hash: OnceCell<String>,
}

impl CryptoVault {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            mode: config.mode,
            encryption_key: config.encryption_key.clone(),
            pepper: config.password_pepper.clone(),
            policy: PasswordPolicy::default(),
            warned_dev_key: AtomicBool::new(false),
            warned_no_pepper: AtomicBool::new(false),
            absent_hash: OnceCell::new(),
        }
    }

    /// Replace the password policy (tests use cheaper parameters).
    pub fn with_policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    fn key(&self) -> Result<Zeroizing<[u8; cipher::KEY_SIZE]>, CryptoError> {
        match (&self.encryption_key, self.mode) {
            (Some(secret), _) => Ok(cipher::derive_key(secret.expose())),
            (None, DeploymentMode::Production) => {
                error!("encryption key missing in production");
                Err(CryptoError::Configuration(
                    "AEGIS_ENCRYPTION_KEY is required in production".into(),
                ))
            }
            (None, DeploymentMode::Development) => {
                if !self.warned_dev_key.swap(true, Ordering::Relaxed) {
                    warn!("AEGIS_ENCRYPTION_KEY not set, using development key");
                }
                Ok(cipher::derive_key(DEV_ENCRYPTION_KEY))
            }
        }
    }

    fn pepper(&self) -> Result<Option<&[u8]>, CryptoError> {
        match (&self.pepper, self.mode) {
            (Some(secret), _) => Ok(Some(secret.expose().as_bytes())),
            (None, DeploymentMode::Production) => {
                error!("password pepper missing in production");
                Err(CryptoError::Configuration(
                    "AEGIS_PASSWORD_PEPPER is required in production".into(),
                ))
            }
            (None, DeploymentMode::Development) => {
                if !self.warned_no_pepper.swap(true, Ordering::Relaxed) {
                    warn!("AEGIS_PASSWORD_PEPPER not set, hashing passwords without pepper");
                }
                Ok(None)
            }
        }
    }

    /// Encrypt a PII value into an `iv:authTag:ciphertext` record.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let key = self.key()?;
        cipher::encrypt(plaintext, &key).map(|field| field.to_string())
    }

    /// Decrypt an `iv:authTag:ciphertext` record.
    pub fn decrypt(&self, record: &str) -> Result<String, CryptoError> {
        let field: EncryptedField = record.parse()?;
        let key = self.key()?;
        cipher::decrypt(&field, &key)
    }

    /// Deterministic keyed hash of `normalize(value)` for equality lookups.
    pub fn hash_for_lookup(&self, value: &str) -> Result<String, CryptoError> {
        let key = self.key()?;
        Ok(cipher::lookup_hash(value, &key))
    }

    /// Encrypt a value and compute its lookup hash in one step.
    pub fn seal_searchable(&self, plaintext: &str) -> Result<(String, String), CryptoError> {
        let key = self.key()?;
        let record = cipher::encrypt(plaintext, &key)?.to_string();
        Ok((record, cipher::lookup_hash(plaintext, &key)))
    }

    /// Argon2id hash of the peppered password.
    ///
    /// Runs on the blocking pool since the hash is deliberately expensive.
    pub async fn hash_password(&self, password: &str) -> Result<String, CryptoError> {
        let pepper = self.pepper()?.map(<[u8]>::to_vec).map(Zeroizing::new);
        let password = Zeroizing::new(password.to_string());
        let policy = self.policy;
        tokio::task::spawn_blocking(move || {
            password::hash_password(&password, pepper.as_ref().map(|p| p.as_slice()), &policy)
        })
        .await
        .map_err(|e| CryptoError::Internal(format!("hash task: {e}")))?
    }

    /// Verify a password. `Ok(false)` for a mismatch or a malformed hash;
    /// `Err` only for missing production key material.
    pub async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, CryptoError> {
        Ok(self.check_password(password, hash).await?.is_match())
    }

    /// Verify and report whether the hash came through a legacy path.
    pub async fn check_password(
        &self,
        password: &str,
        hash: &str,
    ) -> Result<PasswordVerification, CryptoError> {
        let pepper = self.pepper()?.map(<[u8]>::to_vec).map(Zeroizing::new);
        let password = Zeroizing::new(password.to_string());
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || {
            password::verify_password(&password, &hash, pepper.as_ref().map(|p| p.as_slice()))
        })
        .await
        .map_err(|e| CryptoError::Internal(format!("verify task: {e}")))
    }

    /// Verification for a lookup that found no account. Costs the same as a
    /// mismatch against a current-policy hash and always reports `Mismatch`.
    pub async fn check_password_absent(&self, password: &str) -> Result<PasswordVerification, CryptoError> {
        let hash = self
            .absent_hash
            .get_or_try_init(|| self.hash_password(ABSENT_ACCOUNT_SEED))
            .await?;
        self.check_password(password, hash).await?;
        Ok(PasswordVerification::Mismatch)
    }

    /// Whether the stored hash differs from the current policy.
    pub fn needs_rehash(&self, hash: &str) -> bool {
        password::needs_rehash(hash, &self.policy)
    }
}
