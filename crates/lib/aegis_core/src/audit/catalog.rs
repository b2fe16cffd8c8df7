//! Entry validation rules shared by every audit store.

use super::AuditError;
use crate::models::audit::{AuditAction, AuditCategory};

/// Maximum serialized size of an entry's metadata object.
pub const MAX_METADATA_BYTES: usize = 2000;

/// (category, action) pairs an unauthenticated caller may record.
pub const ANONYMOUS_ALLOWED: &[(AuditCategory, AuditAction)] = &[
    (AuditCategory::Auth, AuditAction::LoginFailed),
    (AuditCategory::Auth, AuditAction::MfaFailed),
    (AuditCategory::Auth, AuditAction::PasswordResetRequested),
    (AuditCategory::Security, AuditAction::SuspiciousActivity),
];

pub fn anonymous_allowed(category: AuditCategory, action: AuditAction) -> bool {
    ANONYMOUS_ALLOWED.contains(&(category, action))
}

/// Parse wire strings into catalog values.
pub fn parse_kind(action: &str, category: &str) -> Result<(AuditAction, AuditCategory), AuditError> {
    let action = AuditAction::parse(action)
        .ok_or_else(|| AuditError::Validation(format!("unknown audit action: {action}")))?;
    let category = AuditCategory::parse(category)
        .ok_or_else(|| AuditError::Validation(format!("unknown audit category: {category}")))?;
    Ok((action, category))
}

pub fn validate_metadata(metadata: &serde_json::Map<String, serde_json::Value>) -> Result<(), AuditError> {
    let size = serde_json::to_string(metadata)
        .map_err(|e| AuditError::Validation(format!("metadata is not serializable: {e}")))?
        .len();
    if size > MAX_METADATA_BYTES {
        return Err(AuditError::Validation(format!(
            "metadata is {size} bytes, limit is {MAX_METADATA_BYTES}"
        )));
    }
    Ok(())
}

/// Accept only a JSON object (or null, meaning empty) as metadata.
pub fn metadata_object(
    value: Option<serde_json::Value>,
) -> Result<serde_json::Map<String, serde_json::Value>, AuditError> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(serde_json::Map::new()),
        Some(serde_json::Value::Object(map)) => Ok(map),
        Some(_) => Err(AuditError::Validation("metadata must be a JSON object".into())),
    }
}
