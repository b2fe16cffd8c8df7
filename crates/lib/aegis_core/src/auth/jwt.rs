//! JWT session tokens.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::info;

use super::AuthError;
use crate::models::auth::{Role, Session, TokenClaims};

/// Access token lifetime: 15 minutes.
pub const ACCESS_TOKEN_EXPIRY_SECS: i64 = 15 * 60;

/// Generate a signed JWT access token (HS256, 15 min expiry).
pub fn generate_access_token(user_id: &str, role: Role, secret: &[u8]) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = TokenClaims {
        sub: user_id.to_string(),
        role,
        exp: (now + Duration::seconds(ACCESS_TOKEN_EXPIRY_SECS)).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::TokenError(format!("jwt encode: {e}")))
}

/// Verify a JWT access token and return the session it carries.
pub fn verify_access_token(token: &str, secret: &[u8]) -> Option<Session> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::default();
    validation.validate_exp = true;
    decode::<TokenClaims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims.session())
}

/// Random alphanumeric secret of `len` characters.
pub fn generate_secret(len: usize) -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Resolve the JWT secret: env var `JWT_SECRET` → persisted file → new secret.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret = generate_secret(64);
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("aegis")
        .join("jwt-secret")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-jwt-secret";

    #[test]
    fn token_round_trip_carries_role() {
        let token = generate_access_token("u-1", Role::Moderator, SECRET).unwrap();
        let session = verify_access_token(&token, SECRET).unwrap();
        assert_eq!(session, Session::new("u-1", Role::Moderator));
    }

    #[test]
    fn wrong_secret_or_garbage_is_rejected() {
        let token = generate_access_token("u-1", Role::Admin, SECRET).unwrap();
        assert!(verify_access_token(&token, b"other").is_none());
        assert!(verify_access_token("not.a.jwt", SECRET).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = TokenClaims {
            sub: "u-1".into(),
            role: Role::User,
            exp: (Utc::now() - Duration::hours(1)).timestamp(),
            iat: (Utc::now() - Duration::hours(2)).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap();
        assert!(verify_access_token(&token, SECRET).is_none());
    }

    #[test]
    fn generated_secrets_are_distinct() {
        let a = generate_secret(48);
        assert_eq!(a.len(), 48);
        assert_ne!(a, generate_secret(48));
    }
}
