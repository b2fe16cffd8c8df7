//! Route path constants.

pub const GET_HEALTH: &str = "/health";

pub const POST_AUTH_LOGIN: &str = "/auth/login";
pub const POST_AUTH_REGISTER: &str = "/auth/register";

pub const POST_SECURITY_RATE_LIMIT_CHECK: &str = "/security/rate-limit/check";
pub const DELETE_SECURITY_RATE_LIMIT_IDENTIFIER: &str = "/security/rate-limit/{identifier}";

pub const GET_PERMISSIONS_CHECK_CODE: &str = "/permissions/check/{code}";
pub const GET_ADMIN_USERS_ID_PERMISSIONS: &str = "/admin/users/{userId}/permissions";
pub const POST_ADMIN_USERS_ID_PERMISSIONS_CODE_GRANT: &str =
    "/admin/users/{userId}/permissions/{code}/grant";
pub const POST_ADMIN_USERS_ID_PERMISSIONS_CODE_REVOKE: &str =
    "/admin/users/{userId}/permissions/{code}/revoke";
pub const DELETE_ADMIN_USERS_ID_PERMISSIONS_CODE: &str = "/admin/users/{userId}/permissions/{code}";

pub const POST_AUDIT_LOGS: &str = "/audit-logs";
pub const GET_ADMIN_AUDIT_LOGS: &str = "/admin/audit-logs";
pub const POST_ADMIN_AUDIT_LOGS_READ: &str = "/admin/audit-logs/read";
pub const POST_ADMIN_AUDIT_LOGS_PURGE: &str = "/admin/audit-logs/purge";

pub const POST_ADMIN_SECURITY_ALERTS: &str = "/admin/security/alerts";
pub const POST_ADMIN_SECURITY_ALERTS_TEST: &str = "/admin/security/alerts/test";
