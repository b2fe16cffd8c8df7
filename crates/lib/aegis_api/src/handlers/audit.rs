// @awa-component: SEC-AuditHandler
//
//! Audit log write, read, mark-read and retention handlers.

use aegis_core::audit::{AuditCaller, catalog};
use aegis_core::models::audit::{
    AuditAction, AuditCategory, AuditFilter, AuditLogEntry, AuditPage, NewAuditEntry,
    PageRequest, RetentionSweep,
};
use aegis_core::permissions::codes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{
    AuditLogQuery, CreateAuditLogRequest, MarkReadRequest, MarkReadResponse, PurgeRequest,
    PurgeResponse,
};
use crate::services::access::{Access, ClientOrigin, MaybeSession};

const DEFAULT_PAGE_SIZE: u32 = 50;

/// `POST /audit-logs`: record an entry.
///
/// Anonymous callers may only record the allow-listed failure events; an
/// authenticated caller's entry always carries their own user id.
pub async fn create_handler(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ClientOrigin(origin): ClientOrigin,
    Json(body): Json<CreateAuditLogRequest>,
) -> AppResult<(StatusCode, Json<AuditLogEntry>)> {
    let (action, category) = catalog::parse_kind(&body.action, &body.category)?;
    let mut entry = NewAuditEntry {
        metadata: catalog::metadata_object(body.metadata)?,
        ..NewAuditEntry::new(action, category)
    }
    .origin(origin);
    if let Some(target_id) = body.target_id {
        entry = entry.target(body.target_type.unwrap_or_else(|| "unknown".into()), target_id);
    }

    let caller = match session {
        Some(session) => AuditCaller::User(session),
        None => AuditCaller::Anonymous,
    };
    let stored = state.core.audit.record(entry, &caller).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

fn parse_filter(q: &AuditLogQuery) -> AppResult<AuditFilter> {
    let category = q
        .category
        .as_deref()
        .map(|c| {
            AuditCategory::parse(c)
                .ok_or_else(|| AppError::Validation(format!("unknown audit category: {c}")))
        })
        .transpose()?;
    let action = q
        .action
        .as_deref()
        .map(|a| {
            AuditAction::parse(a)
                .ok_or_else(|| AppError::Validation(format!("unknown audit action: {a}")))
        })
        .transpose()?;
    if let (Some(from), Some(to)) = (q.from, q.to)
        && from > to
    {
        return Err(AppError::Validation("`from` must not be after `to`".into()));
    }

    Ok(AuditFilter {
        category,
        action,
        user_id: q.user_id.clone(),
        target_id: q.target_id.clone(),
        from: q.from,
        to: q.to,
        unread_only: q.unread_only,
    })
}

/// `GET /admin/audit-logs`: filtered, newest-first page.
pub async fn query_handler(
    State(state): State<AppState>,
    mut access: Access,
    Query(q): Query<AuditLogQuery>,
) -> AppResult<Json<AuditPage>> {
    access.require(codes::SECURITY_AUDIT_VIEW).await?;
    let filter = parse_filter(&q)?;
    let page = PageRequest {
        before: q.before,
        limit: q.limit.unwrap_or(DEFAULT_PAGE_SIZE),
    };
    Ok(Json(state.core.audit.query(&filter, page).await?))
}

/// `POST /admin/audit-logs/read`: mark entries as read.
pub async fn mark_read_handler(
    State(state): State<AppState>,
    mut access: Access,
    Json(body): Json<MarkReadRequest>,
) -> AppResult<Json<MarkReadResponse>> {
    access.require(codes::SECURITY_AUDIT_VIEW).await?;
    let updated = state.core.audit.mark_read(&body.ids).await?;
    Ok(Json(MarkReadResponse { updated }))
}

/// `POST /admin/audit-logs/purge`: retention sweep by age and read status.
pub async fn purge_handler(
    State(state): State<AppState>,
    mut access: Access,
    Json(body): Json<PurgeRequest>,
) -> AppResult<Json<PurgeResponse>> {
    access.require(codes::SECURITY_AUDIT_PURGE).await?;
    if body.older_than_days == 0 {
        return Err(AppError::Validation("olderThanDays must be at least 1".into()));
    }

    let sweep = RetentionSweep {
        older_than: Utc::now() - Duration::days(i64::from(body.older_than_days)),
        only_read: body.only_read,
    };
    let deleted = state
        .core
        .audit
        .purge(sweep, Some(access.session().user_id.as_str()))
        .await?;
    Ok(Json(PurgeResponse { deleted }))
}
