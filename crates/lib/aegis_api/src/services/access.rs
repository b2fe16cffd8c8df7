// @awa-component: SEC-AccessGuard
//
//! Request-scoped extractors: permission guard and client origin.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use aegis_core::SecurityCore;
use aegis_core::models::audit::RequestOrigin;
use aegis_core::models::auth::Session;
use aegis_core::permissions::RequestPermissionCache;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use tracing::debug;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;

/// Authenticated caller plus a permission cache that lives for one request.
pub struct Access {
    core: Arc<SecurityCore>,
    session: Session,
    cache: RequestPermissionCache,
}

impl Access {
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether the caller holds `code`. Repeated checks hit the request cache.
    pub async fn allows(&mut self, code: &str) -> AppResult<bool> {
        let decision = self
            .core
            .permissions
            .resolve_cached(&mut self.cache, &self.session.user_id, self.session.role, code)
            .await?;
        Ok(decision.is_allowed())
    }

    /// `Forbidden` unless the caller holds `code`.
    pub async fn require(&mut self, code: &str) -> AppResult<()> {
        if self.allows(code).await? {
            return Ok(());
        }
        debug!(user_id = %self.session.user_id, code, "permission denied");
        Err(AppError::Forbidden(format!("missing permission {code}")))
    }
}

impl FromRequestParts<AppState> for Access {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(session) = parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;
        Ok(Self {
            core: Arc::clone(&state.core),
            session,
            cache: RequestPermissionCache::new(),
        })
    }
}

/// Session if the request carried a valid token, `None` for anonymous callers.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Session>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|AuthenticatedUser(session)| session.clone()),
        ))
    }
}

/// Client address and user agent.
///
/// The address is the connected peer. Forwarding headers are honored only
/// when that peer is one of the configured trusted proxies, in which case the
/// rightmost `X-Forwarded-For` hop that is not itself a trusted proxy wins.
#[derive(Debug, Clone, Default)]
pub struct ClientOrigin(pub RequestOrigin);

pub fn resolve_origin(headers: &HeaderMap, peer: Option<IpAddr>, trusted_proxies: &[IpAddr]) -> RequestOrigin {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let ip_address = peer.map(|peer| {
        if !trusted_proxies.contains(&peer) {
            return peer;
        }
        let forwarded = header("x-forwarded-for").and_then(|v| {
            v.rsplit(',')
                .map(|hop| hop.trim().parse::<IpAddr>())
                .find(|hop| !matches!(hop, Ok(ip) if trusted_proxies.contains(ip)))
                .and_then(Result::ok)
        });
        forwarded
            .or_else(|| header("x-real-ip").and_then(|v| v.parse().ok()))
            .unwrap_or(peer)
    });
    RequestOrigin {
        ip_address: ip_address.map(|ip| ip.to_string()),
        user_agent: header("user-agent").map(str::to_string),
    }
}

impl FromRequestParts<AppState> for ClientOrigin {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(Self(resolve_origin(&parts.headers, peer, &state.config.trusted_proxies)))
    }
}
