// @awa-component: SEC-CredentialService
//
//! Login and registration flows over the security core.
//!
//! Login is throttled under the `login` policy twice: per client address and
//! per target account, so neither rotating addresses nor spraying accounts
//! escapes the window. Failed attempts are audited and exhausting a window
//! raises a brute-force alert. Passwords stored through a legacy path are
//! upgraded on success. Registration is throttled per client address.

use aegis_core::SecurityCore;
use aegis_core::audit::{AuditCaller, AuditError};
use aegis_core::auth::{NewUser, RoleAssignment};
use aegis_core::auth::jwt::{ACCESS_TOKEN_EXPIRY_SECS, generate_access_token};
use aegis_core::crypto::PasswordVerification;
use aegis_core::models::alerts::{SecurityAlert, Severity};
use aegis_core::models::audit::{AuditAction, AuditCategory, NewAuditEntry, RequestOrigin};
use aegis_core::models::auth::UserAccount;
use aegis_core::models::rate_limit::{OperationClass, RateLimitDecision};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{AuthUser, TokenResponse};

/// Minimum accepted password length at registration.
pub const MIN_PASSWORD_LEN: usize = 8;

const UNKNOWN_CLIENT: &str = "unknown";

/// Rate-limit subject for login attempts against one account.
pub fn account_subject(email_hash: &str) -> String {
    format!("account:{email_hash}")
}

fn token_response(user: &UserAccount, jwt_secret: &[u8]) -> AppResult<TokenResponse> {
    let access_token = generate_access_token(&user.id, user.role, jwt_secret)?;
    Ok(TokenResponse {
        access_token,
        token_type: "Bearer".into(),
        expires_in: ACCESS_TOKEN_EXPIRY_SECS,
        user: AuthUser {
            id: user.id.clone(),
            name: user.name.clone(),
            role: user.role,
        },
    })
}

/// Record an auth event. Store outages are logged and do not change the
/// response; validation failures propagate.
async fn audit(core: &SecurityCore, entry: NewAuditEntry) -> AppResult<()> {
    let action = entry.action;
    match core.audit.record(entry, &AuditCaller::System).await {
        Ok(_) => Ok(()),
        Err(e @ (AuditError::Store(_) | AuditError::DbError(_))) => {
            warn!(%action, error = %e, "audit write failed");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Count one attempt against `subject`. A denial is audited and, for login,
/// alerted before surfacing as `RateLimited`.
async fn throttle(
    core: &SecurityCore,
    class: OperationClass,
    subject: &str,
    origin: &RequestOrigin,
) -> AppResult<RateLimitDecision> {
    let decision = core.rate_limiter.check_policy(class, subject).await;
    if decision.allowed {
        return Ok(decision);
    }

    audit(
        core,
        NewAuditEntry::new(AuditAction::RateLimitExceeded, AuditCategory::Security)
            .meta("operation", class.as_str())
            .meta("identifier", class.identifier(subject))
            .origin(origin.clone()),
    )
    .await?;
    if class == OperationClass::Login {
        let client = origin.ip_address.as_deref().unwrap_or(UNKNOWN_CLIENT);
        core.alerts.dispatch_detached(
            SecurityAlert::new(
                Severity::High,
                "rate_limit_exceeded",
                "Login rate limit exceeded",
                format!("Login attempts for {subject} are being throttled"),
            )
            .detail("ipAddress", client),
        );
    }
    Err(AppError::RateLimited {
        retry_after_ms: decision.reset_in_ms,
    })
}

/// Authenticate with email + password.
pub async fn login(
    core: &SecurityCore,
    email: &str,
    password: &str,
    origin: &RequestOrigin,
    jwt_secret: &[u8],
) -> AppResult<TokenResponse> {
    let email_hash = core.vault.hash_for_lookup(email)?;

    // Without a known client address only the account bucket applies.
    let mut remaining = match origin.ip_address.as_deref() {
        Some(ip) => throttle(core, OperationClass::Login, ip, origin).await?.remaining,
        None => u32::MAX,
    };
    let by_account = throttle(core, OperationClass::Login, &account_subject(&email_hash), origin).await?;
    remaining = remaining.min(by_account.remaining);

    let user = core.users.find_by_email_hash(&email_hash).await?;

    let verification = match user.as_ref().and_then(|u| u.password_hash.as_deref()) {
        Some(hash) => core.vault.check_password(password, hash).await?,
        None => core.vault.check_password_absent(password).await?,
    };

    let user = match (user, verification) {
        (Some(user), v) if v.is_match() => user,
        (user, _) => {
            let mut entry = NewAuditEntry::new(AuditAction::LoginFailed, AuditCategory::Auth)
                .meta("reason", if user.is_some() { "bad_password" } else { "unknown_account" })
                .origin(origin.clone());
            if let Some(user) = &user {
                entry = entry.user(user.id.clone());
            }
            audit(core, entry).await?;

            if remaining == 0 {
                let client = origin.ip_address.as_deref().unwrap_or(UNKNOWN_CLIENT);
                let limit = core.rate_limiter.policy(OperationClass::Login).limit;
                core.alerts.dispatch_detached(
                    SecurityAlert::new(
                        Severity::High,
                        "brute_force",
                        "Possible brute-force login",
                        format!("{limit} failed login attempts from {client}"),
                    )
                    .detail("ipAddress", client)
                    .detail("attempts", limit),
                );
            }
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
    };

    if let Some(hash) = user.password_hash.as_deref() {
        let legacy = verification == PasswordVerification::VerifiedLegacy;
        if legacy || core.vault.needs_rehash(hash) {
            if let Err(e) = rehash(core, &user, password, legacy, origin).await {
                warn!(user_id = %user.id, error = %e, "password rehash failed");
            }
        }
    }

    audit(
        core,
        NewAuditEntry::new(AuditAction::LoginSuccess, AuditCategory::Auth)
            .user(user.id.clone())
            .origin(origin.clone()),
    )
    .await?;

    info!(user_id = %user.id, "user logged in");
    token_response(&user, jwt_secret)
}

async fn rehash(
    core: &SecurityCore,
    user: &UserAccount,
    password: &str,
    legacy: bool,
    origin: &RequestOrigin,
) -> AppResult<()> {
    let fresh = core.vault.hash_password(password).await?;
    core.users.update_password_hash(&user.id, &fresh).await?;
    audit(
        core,
        NewAuditEntry::new(AuditAction::PasswordRehashed, AuditCategory::Auth)
            .user(user.id.clone())
            .meta("legacy", legacy)
            .origin(origin.clone()),
    )
    .await
}

/// Create a new account. The first account becomes superadmin.
pub async fn register(
    core: &SecurityCore,
    email: &str,
    password: &str,
    name: Option<&str>,
    origin: &RequestOrigin,
    jwt_secret: &[u8],
) -> AppResult<TokenResponse> {
    if let Some(ip) = origin.ip_address.as_deref() {
        throttle(core, OperationClass::Register, ip, origin).await?;
    }

    let email = email.trim();
    if email.len() < 3 || !email.contains('@') {
        return Err(AppError::Validation("A valid email address is required".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let (email_encrypted, email_hash) = core.vault.seal_searchable(email)?;
    let password_hash = core.vault.hash_password(password).await?;
    let name = name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);

    let user = core
        .users
        .create(NewUser {
            email_encrypted,
            email_hash,
            name,
            password_hash,
            role: RoleAssignment::Bootstrap,
        })
        .await?;

    audit(
        core,
        NewAuditEntry::new(AuditAction::AccountRegistered, AuditCategory::Auth)
            .user(user.id.clone())
            .meta("role", user.role.as_str())
            .origin(origin.clone()),
    )
    .await?;

    info!(user_id = %user.id, role = %user.role, "user registered");
    token_response(&user, jwt_secret)
}
