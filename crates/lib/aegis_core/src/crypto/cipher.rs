//! AES-256-GCM field encryption and keyed lookup hashing.
//!
//! Encrypted fields are stored as `iv:authTag:ciphertext`, each part standard
//! base64. A fresh random 12-byte IV is drawn per call, so ciphertext is never
//! stable and must not be used as a lookup key; use [`lookup_hash`] for that.

use std::fmt;
use std::str::FromStr;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::CryptoError;

/// Nonce size for AES-256-GCM (12 bytes).
pub const IV_SIZE: usize = 12;
/// AES-256 key size (32 bytes).
pub const KEY_SIZE: usize = 32;
/// GCM tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// BLAKE3 derivation context for the lookup-hash key.
const LOOKUP_KEY_CONTEXT: &str = "aegis 2024-06-01 field lookup hash v1";

/// Derive the 32-byte encryption key from configured key material.
///
/// 64 hex characters are taken as the raw key; anything else is treated as a
/// passphrase and hashed with SHA-256.
pub fn derive_key(material: &str) -> Zeroizing<[u8; KEY_SIZE]> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    if material.len() == KEY_SIZE * 2
        && let Ok(raw) = hex::decode(material)
    {
        key.copy_from_slice(&raw);
        return key;
    }
    let mut hasher = Sha256::new();
    hasher.update(material.as_bytes());
    key.copy_from_slice(&hasher.finalize());
    key
}

/// A parsed `iv:authTag:ciphertext` record.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedField {
    pub iv: [u8; IV_SIZE],
    pub tag: [u8; TAG_SIZE],
    pub ciphertext: Vec<u8>,
}

impl fmt::Display for EncryptedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            STANDARD.encode(self.iv),
            STANDARD.encode(self.tag),
            STANDARD.encode(&self.ciphertext)
        )
    }
}

impl fmt::Debug for EncryptedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedField")
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

impl FromStr for EncryptedField {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let [iv, tag, ciphertext] = parts.as_slice() else {
            return Err(CryptoError::Validation(format!(
                "Encrypted field must have 3 parts, found {}",
                parts.len()
            )));
        };

        let iv = decode_part(iv, "iv")?;
        let tag = decode_part(tag, "authTag")?;
        let ciphertext = decode_part(ciphertext, "ciphertext")?;

        Ok(Self {
            iv: iv
                .try_into()
                .map_err(|_| CryptoError::Validation(format!("IV must be {IV_SIZE} bytes")))?,
            tag: tag
                .try_into()
                .map_err(|_| CryptoError::Validation(format!("Auth tag must be {TAG_SIZE} bytes")))?,
            ciphertext,
        })
    }
}

fn decode_part(part: &str, name: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(part)
        .map_err(|e| CryptoError::Validation(format!("Base64 decode of {name} failed: {e}")))
}

/// Encrypt plaintext with AES-256-GCM under a fresh random IV.
pub fn encrypt(plaintext: &str, key: &[u8; KEY_SIZE]) -> Result<EncryptedField, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| CryptoError::Internal(format!("Key init failed: {e}")))?;

    let mut iv = [0u8; IV_SIZE];
    rand::rng().fill_bytes(&mut iv);

    let mut sealed = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|e| CryptoError::Internal(format!("Encryption failed: {e}")))?;

    // aes-gcm appends the tag to the ciphertext
    let tag_start = sealed.len() - TAG_SIZE;
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&sealed[tag_start..]);
    sealed.truncate(tag_start);

    Ok(EncryptedField {
        iv,
        tag,
        ciphertext: sealed,
    })
}

/// Decrypt and authenticate a field. Any tampering, a wrong key, or a
/// non-UTF-8 payload is a [`CryptoError::Decryption`].
pub fn decrypt(field: &EncryptedField, key: &[u8; KEY_SIZE]) -> Result<String, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| CryptoError::Internal(format!("Key init failed: {e}")))?;

    let mut sealed = Vec::with_capacity(field.ciphertext.len() + TAG_SIZE);
    sealed.extend_from_slice(&field.ciphertext);
    sealed.extend_from_slice(&field.tag);

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&field.iv), sealed.as_slice())
        .map_err(|_| CryptoError::Decryption("authentication failed".into()))?;

    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::Decryption("plaintext is not valid UTF-8".into()))
}

/// Normalization applied before lookup hashing (emails and similar identifiers).
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Deterministic keyed hash of the normalized value, hex encoded.
pub fn lookup_hash(value: &str, key: &[u8; KEY_SIZE]) -> String {
    let lookup_key = Zeroizing::new(blake3::derive_key(LOOKUP_KEY_CONTEXT, key));
    blake3::keyed_hash(&lookup_key, normalize(value).as_bytes())
        .to_hex()
        .to_string()
}
