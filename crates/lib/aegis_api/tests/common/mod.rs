//! Shared fixtures: an in-memory core behind the real router.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use aegis_api::{AppState, config::ApiConfig};
use aegis_core::auth::jwt::generate_access_token;
use aegis_core::config::SecurityConfig;
use aegis_core::crypto::PasswordPolicy;
use aegis_core::models::auth::Role;
use aegis_core::{MemoryStores, SecurityCore};
use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, Response, StatusCode};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-secret";

/// The only peer whose forwarding headers the test router honors.
pub const TRUSTED_PROXY: &str = "10.0.0.1";

pub struct TestApp {
    pub app: Router,
    pub stores: MemoryStores,
    pub core: Arc<SecurityCore>,
}

fn light_policy() -> PasswordPolicy {
    PasswordPolicy {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
        output_len: 32,
    }
}

/// Router with one seeded account per role: `root`, `admin`, `mod`, `user`.
pub fn setup() -> TestApp {
    let app = setup_unseeded();
    for (id, role) in [
        ("root", Role::SuperAdmin),
        ("admin", Role::Admin),
        ("mod", Role::Moderator),
        ("user", Role::User),
    ] {
        app.stores.users.put_role(id, role);
    }
    app
}

/// Router over fresh, empty in-memory stores. The pool points at a closed
/// port so only `/health` ever touches it.
pub fn setup_unseeded() -> TestApp {
    let stores = MemoryStores::new();

    let core = Arc::new(
        SecurityCore::with_stores(SecurityConfig::default(), stores.core_stores())
            .expect("core")
            .with_password_policy(light_policy()),
    );
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(500))
        .connect_lazy("postgres://aegis@127.0.0.1:1/aegis")
        .expect("lazy pool");

    let state = AppState {
        pool,
        config: ApiConfig {
            bind_addr: "127.0.0.1:0".into(),
            pg_connection_url: "postgres://aegis@127.0.0.1:1/aegis".into(),
            jwt_secret: JWT_SECRET.into(),
            trusted_proxies: vec![TRUSTED_PROXY.parse().expect("proxy ip")],
        },
        core: core.clone(),
    };
    TestApp {
        app: aegis_api::router(state),
        stores,
        core,
    }
}

pub fn token(user_id: &str, role: Role) -> String {
    generate_access_token(user_id, role, JWT_SECRET.as_bytes()).expect("token")
}

pub struct Call<'a> {
    method: Method,
    uri: &'a str,
    token: Option<String>,
    peer_ip: Option<&'a str>,
    forwarded_for: Option<&'a str>,
    body: Option<Value>,
}

pub fn call(method: Method, uri: &str) -> Call<'_> {
    Call {
        method,
        uri,
        token: None,
        peer_ip: None,
        forwarded_for: None,
        body: None,
    }
}

impl<'a> Call<'a> {
    pub fn as_user(mut self, user_id: &str, role: Role) -> Self {
        self.token = Some(token(user_id, role));
        self
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Connect directly from `ip`.
    pub fn from_ip(mut self, ip: &'a str) -> Self {
        self.peer_ip = Some(ip);
        self
    }

    /// Send an `X-Forwarded-For` header. Only honored when the peer is
    /// [`TRUSTED_PROXY`].
    pub fn forwarded_for(mut self, xff: &'a str) -> Self {
        self.forwarded_for = Some(xff);
        self
    }

    /// Arrive through the trusted proxy on behalf of `client`.
    pub fn via_proxy(self, client: &'a str) -> Self {
        self.from_ip(TRUSTED_PROXY).forwarded_for(client)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub async fn send_raw(self, app: &Router) -> Response<Body> {
        let mut req = Request::builder().method(self.method).uri(self.uri);
        if let Some(token) = &self.token {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        if let Some(ip) = self.peer_ip {
            let addr = SocketAddr::new(ip.parse().expect("peer ip"), 40_000);
            req = req.extension(ConnectInfo(addr));
        }
        if let Some(xff) = self.forwarded_for {
            req = req.header("x-forwarded-for", xff);
        }
        let req = match self.body {
            Some(body) => req
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .expect("request");
        app.clone().oneshot(req).await.expect("response")
    }

    pub async fn send(self, app: &Router) -> (StatusCode, Value) {
        let resp = self.send_raw(app).await;
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse JSON")
        };
        (status, json)
    }
}
