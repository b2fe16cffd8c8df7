//! Password hashing via Argon2id with a server-side pepper.
//!
//! The pepper is passed as the Argon2 secret input, so a database-only leak
//! is not enough to mount an offline attack. Legacy bcrypt hashes and
//! unpeppered Argon2 hashes still verify and are flagged for rehash.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use super::CryptoError;

/// Argon2 memory cost in KiB (64 MiB).
pub const DEFAULT_MEMORY_KIB: u32 = 64 * 1024;
/// Argon2 iterations.
pub const DEFAULT_ITERATIONS: u32 = 3;
/// Argon2 lanes.
pub const DEFAULT_PARALLELISM: u32 = 4;
/// Output length in bytes (256 bits).
pub const DEFAULT_OUTPUT_LEN: usize = 32;
/// Salt length in bytes.
const SALT_LEN: usize = 16;

/// Argon2id parameters currently required for stored hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub output_len: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            memory_kib: DEFAULT_MEMORY_KIB,
            iterations: DEFAULT_ITERATIONS,
            parallelism: DEFAULT_PARALLELISM,
            output_len: DEFAULT_OUTPUT_LEN,
        }
    }
}

impl PasswordPolicy {
    fn params(&self) -> Result<Params, CryptoError> {
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(self.output_len),
        )
        .map_err(|e| CryptoError::Internal(format!("Invalid Argon2 parameters: {e}")))
    }
}

/// Outcome of a password check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordVerification {
    /// Matched a current, peppered hash.
    Verified,
    /// Matched, but through a legacy path (unpeppered Argon2 or bcrypt);
    /// the caller should store a fresh hash.
    VerifiedLegacy,
    Mismatch,
}

impl PasswordVerification {
    pub fn is_match(&self) -> bool {
        !matches!(self, PasswordVerification::Mismatch)
    }
}

fn is_bcrypt(hash: &str) -> bool {
    ["$2a$", "$2b$", "$2x$", "$2y$"]
        .iter()
        .any(|prefix| hash.starts_with(prefix))
}

/// Hash a password. `pepper` of `None` produces an unpeppered hash.
pub fn hash_password(
    password: &str,
    pepper: Option<&[u8]>,
    policy: &PasswordPolicy,
) -> Result<String, CryptoError> {
    let params = policy.params()?;
    let argon2 = match pepper {
        Some(secret) => Argon2::new_with_secret(secret, Algorithm::Argon2id, Version::V0x13, params)
            .map_err(|e| CryptoError::Internal(format!("Argon2 init: {e}")))?,
        None => Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
    };

    let mut salt_bytes = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| CryptoError::Internal(format!("Salt encode: {e}")))?;

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| CryptoError::Internal(format!("Argon2 hash: {e}")))
}

/// Verify a password: peppered first, then unpeppered, then bcrypt.
///
/// Never fails on a mismatched or malformed stored hash.
pub fn verify_password(password: &str, hash: &str, pepper: Option<&[u8]>) -> PasswordVerification {
    if is_bcrypt(hash) {
        return match bcrypt::verify(password, hash) {
            Ok(true) => PasswordVerification::VerifiedLegacy,
            _ => PasswordVerification::Mismatch,
        };
    }

    let Ok(parsed) = PasswordHash::new(hash) else {
        return PasswordVerification::Mismatch;
    };

    if let Some(secret) = pepper
        && let Ok(argon2) = Argon2::new_with_secret(
            secret,
            Algorithm::Argon2id,
            Version::V0x13,
            Params::default(),
        )
        && argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    {
        return PasswordVerification::Verified;
    }

    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
    {
        // Without a configured pepper an unpeppered hash is the current form.
        return if pepper.is_some() {
            PasswordVerification::VerifiedLegacy
        } else {
            PasswordVerification::Verified
        };
    }

    PasswordVerification::Mismatch
}

/// Whether a stored hash was produced with anything other than the current policy.
pub fn needs_rehash(hash: &str, policy: &PasswordPolicy) -> bool {
    if is_bcrypt(hash) {
        return true;
    }
    let Ok(parsed) = PasswordHash::new(hash) else {
        return true;
    };
    if parsed.algorithm.as_str() != "argon2id" || parsed.version != Some(0x13) {
        return true;
    }
    let Ok(params) = Params::try_from(&parsed) else {
        return true;
    };
    params.m_cost() != policy.memory_kib
        || params.t_cost() != policy.iterations
        || params.p_cost() != policy.parallelism
        || parsed.hash.map(|h| h.len()) != Some(policy.output_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cheap parameters so the suite stays fast; policy checks use the default.
    fn light() -> PasswordPolicy {
        PasswordPolicy {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
            output_len: 32,
        }
    }

    const PEPPER: &[u8] = b"server-side-pepper";

    #[test]
    fn default_policy_meets_minimums() {
        let policy = PasswordPolicy::default();
        assert!(policy.memory_kib >= 64 * 1024);
        assert!(policy.iterations >= 3);
        assert!(policy.output_len * 8 >= 256);
    }

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("correct horse", Some(PEPPER), &light()).unwrap();
        assert!(hash.starts_with("$argon2id$v=19$"));
        assert_eq!(
            verify_password("correct horse", &hash, Some(PEPPER)),
            PasswordVerification::Verified
        );
        assert_eq!(
            verify_password("wrong horse", &hash, Some(PEPPER)),
            PasswordVerification::Mismatch
        );
    }

    #[test]
    fn peppered_hash_does_not_verify_without_pepper() {
        let hash = hash_password("pw", Some(PEPPER), &light()).unwrap();
        assert_eq!(verify_password("pw", &hash, None), PasswordVerification::Mismatch);
        assert_eq!(
            verify_password("pw", &hash, Some(b"other-pepper")),
            PasswordVerification::Mismatch
        );
    }

    #[test]
    fn unpeppered_hash_verifies_as_legacy_when_pepper_configured() {
        let hash = hash_password("pw", None, &light()).unwrap();
        assert_eq!(
            verify_password("pw", &hash, Some(PEPPER)),
            PasswordVerification::VerifiedLegacy
        );
        assert_eq!(verify_password("pw", &hash, None), PasswordVerification::Verified);
    }

    #[test]
    fn bcrypt_hash_verifies_as_legacy() {
        let hash = bcrypt::hash("old-password", 4).unwrap();
        assert_eq!(
            verify_password("old-password", &hash, Some(PEPPER)),
            PasswordVerification::VerifiedLegacy
        );
        assert_eq!(
            verify_password("nope", &hash, Some(PEPPER)),
            PasswordVerification::Mismatch
        );
        assert!(needs_rehash(&hash, &light()));
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        for hash in ["", "plaintext", "$argon2id$garbage", "$2b$broken"] {
            assert_eq!(
                verify_password("pw", hash, Some(PEPPER)),
                PasswordVerification::Mismatch,
                "{hash:?}"
            );
        }
    }

    #[test]
    fn needs_rehash_tracks_policy() {
        let hash = hash_password("pw", Some(PEPPER), &light()).unwrap();
        assert!(!needs_rehash(&hash, &light()));

        let stronger = PasswordPolicy {
            iterations: 2,
            ..light()
        };
        assert!(needs_rehash(&hash, &stronger));
        assert!(needs_rehash("not-a-hash", &light()));
    }
}
