//! Login and registration against in-memory stores.

mod common;

use aegis_core::auth::UserStore;
use aegis_core::crypto::PasswordPolicy;
use aegis_core::crypto::password;
use aegis_core::models::audit::AuditAction;
use aegis_core::models::auth::{Role, UserAccount};
use axum::http::header::RETRY_AFTER;
use axum::http::{Method, StatusCode};
use common::{call, setup_unseeded};
use serde_json::json;

async fn register(app: &axum::Router, email: &str, pw: &str) -> (StatusCode, serde_json::Value) {
    call(Method::POST, "/auth/register")
        .json(json!({ "email": email, "password": pw, "name": "Dana" }))
        .send(app)
        .await
}

#[tokio::test]
async fn first_account_bootstraps_as_superadmin() {
    let t = setup_unseeded();

    let (status, first) = register(&t.app, "owner@example.com", "correct horse").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["user"]["role"], "superadmin");
    assert_eq!(first["tokenType"], "Bearer");
    assert!(first["accessToken"].as_str().is_some_and(|s| !s.is_empty()));

    let (_, second) = register(&t.app, "staff@example.com", "battery staple").await;
    assert_eq!(second["user"]["role"], "user");

    let id = second["user"]["id"].as_str().unwrap();
    let stored = t.stores.users.find_by_id(id).await.unwrap().unwrap();
    assert!(!stored.email_encrypted.contains("staff@example.com"));
    assert_eq!(
        t.core.vault.decrypt(&stored.email_encrypted).unwrap(),
        "staff@example.com"
    );
}

#[tokio::test]
async fn registration_validates_input() {
    let t = setup_unseeded();

    let (status, body) = register(&t.app, "not-an-email", "correct horse").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = register(&t.app, "a@example.com", "short").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = register(&t.app, "a@example.com", "correct horse").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = register(&t.app, " A@Example.com ", "another one").await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "lookup hash is normalized");
}

#[tokio::test]
async fn login_issues_token_and_audits_success() {
    let t = setup_unseeded();
    register(&t.app, "dana@example.com", "correct horse").await;

    let (status, body) = call(Method::POST, "/auth/login")
        .from_ip("198.51.100.4")
        .json(json!({ "email": "Dana@Example.com", "password": "correct horse" }))
        .send(&t.app)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Dana");
    assert_eq!(body["expiresIn"], 900);

    let entries = t.stores.audit.all().await;
    let success = entries
        .iter()
        .find(|e| e.action == AuditAction::LoginSuccess)
        .expect("login_success entry");
    assert_eq!(success.user_id.as_deref(), body["user"]["id"].as_str());
    assert_eq!(success.ip_address.as_deref(), Some("198.51.100.4"));
}

async fn login(app: &axum::Router, peer: Option<&str>, email: &str, pw: &str) -> StatusCode {
    let mut req = call(Method::POST, "/auth/login").json(json!({ "email": email, "password": pw }));
    if let Some(peer) = peer {
        req = req.from_ip(peer);
    }
    req.send(app).await.0
}

fn count(entries: &[aegis_core::models::audit::AuditLogEntry], action: AuditAction) -> usize {
    entries.iter().filter(|e| e.action == action).count()
}

#[tokio::test]
async fn repeated_failures_are_audited_then_throttled() {
    let t = setup_unseeded();
    register(&t.app, "dana@example.com", "correct horse").await;
    register(&t.app, "eli@example.com", "battery staple").await;

    for _ in 0..5 {
        let (status, body) = call(Method::POST, "/auth/login")
            .from_ip("203.0.113.9")
            .json(json!({ "email": "dana@example.com", "password": "wrong" }))
            .send(&t.app)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");
    }

    // The right password no longer helps from this address.
    let resp = call(Method::POST, "/auth/login")
        .from_ip("203.0.113.9")
        .json(json!({ "email": "dana@example.com", "password": "correct horse" }))
        .send_raw(&t.app)
        .await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(resp.headers().contains_key(RETRY_AFTER));

    // Nor from another address: the account itself is cooling down.
    assert_eq!(
        login(&t.app, Some("203.0.113.10"), "dana@example.com", "correct horse").await,
        StatusCode::TOO_MANY_REQUESTS
    );
    // Other accounts from other addresses are unaffected.
    assert_eq!(
        login(&t.app, Some("203.0.113.10"), "eli@example.com", "battery staple").await,
        StatusCode::OK
    );

    let entries = t.stores.audit.all().await;
    assert_eq!(count(&entries, AuditAction::LoginFailed), 5);
    assert_eq!(count(&entries, AuditAction::RateLimitExceeded), 2);
}

#[tokio::test]
async fn forwarded_for_from_an_untrusted_peer_is_ignored() {
    let t = setup_unseeded();

    for n in 0..5 {
        let spoofed = format!("192.0.2.{n}");
        let (status, _) = call(Method::POST, "/auth/login")
            .from_ip("203.0.113.9")
            .forwarded_for(&spoofed)
            .json(json!({ "email": format!("user{n}@example.com"), "password": "wrong" }))
            .send(&t.app)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, _) = call(Method::POST, "/auth/login")
        .from_ip("203.0.113.9")
        .forwarded_for("192.0.2.200")
        .json(json!({ "email": "fresh@example.com", "password": "wrong" }))
        .send(&t.app)
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let entries = t.stores.audit.all().await;
    assert!(
        entries
            .iter()
            .all(|e| e.ip_address.as_deref() == Some("203.0.113.9"))
    );
}

#[tokio::test]
async fn rotating_addresses_still_hit_the_account_window() {
    let t = setup_unseeded();
    register(&t.app, "dana@example.com", "correct horse").await;

    for n in 1..=5 {
        let peer = format!("198.51.100.{n}");
        assert_eq!(
            login(&t.app, Some(&peer), "dana@example.com", "wrong").await,
            StatusCode::UNAUTHORIZED
        );
    }
    assert_eq!(
        login(&t.app, Some("198.51.100.99"), "dana@example.com", "correct horse").await,
        StatusCode::TOO_MANY_REQUESTS
    );

    let entries = t.stores.audit.all().await;
    let exceeded = entries
        .iter()
        .find(|e| e.action == AuditAction::RateLimitExceeded)
        .expect("rate_limit_exceeded entry");
    assert!(
        exceeded.metadata["identifier"]
            .as_str()
            .is_some_and(|id| id.starts_with("login:account:"))
    );
}

#[tokio::test]
async fn trusted_proxy_attributes_the_forwarded_client() {
    let t = setup_unseeded();
    register(&t.app, "dana@example.com", "correct horse").await;
    register(&t.app, "eli@example.com", "battery staple").await;

    // One client behind the proxy exhausts its own window.
    for _ in 0..5 {
        let (status, _) = call(Method::POST, "/auth/login")
            .via_proxy("192.0.2.10")
            .json(json!({ "email": "dana@example.com", "password": "wrong" }))
            .send(&t.app)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // A different client through the same proxy is not throttled with it.
    let (status, _) = call(Method::POST, "/auth/login")
        .via_proxy("192.0.2.11")
        .json(json!({ "email": "eli@example.com", "password": "battery staple" }))
        .send(&t.app)
        .await;
    assert_eq!(status, StatusCode::OK);

    let entries = t.stores.audit.all().await;
    let success = entries
        .iter()
        .find(|e| e.action == AuditAction::LoginSuccess)
        .expect("login_success entry");
    assert_eq!(success.ip_address.as_deref(), Some("192.0.2.11"));
}

#[tokio::test]
async fn missing_client_address_does_not_pool_accounts() {
    let t = setup_unseeded();
    register(&t.app, "dana@example.com", "correct horse").await;

    for n in 0..6 {
        assert_eq!(
            login(&t.app, None, &format!("ghost{n}@example.com"), "wrong").await,
            StatusCode::UNAUTHORIZED
        );
    }
    assert_eq!(
        login(&t.app, None, "dana@example.com", "correct horse").await,
        StatusCode::OK
    );
}

#[tokio::test]
async fn registration_is_throttled_per_address() {
    let t = setup_unseeded();

    for n in 0..5 {
        let (status, _) = call(Method::POST, "/auth/register")
            .from_ip("203.0.113.50")
            .json(json!({ "email": format!("bulk{n}@example.com"), "password": "correct horse" }))
            .send(&t.app)
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = call(Method::POST, "/auth/register")
        .from_ip("203.0.113.50")
        .json(json!({ "email": "bulk5@example.com", "password": "correct horse" }))
        .send(&t.app)
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = call(Method::POST, "/auth/register")
        .from_ip("203.0.113.51")
        .json(json!({ "email": "bulk5@example.com", "password": "correct horse" }))
        .send(&t.app)
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_are_atomic() {
    let t = setup_unseeded();

    let mut handles = Vec::new();
    for n in 0..8 {
        let app = t.app.clone();
        handles.push(tokio::spawn(async move {
            // Half race for one address, the rest for their own.
            let email = if n % 2 == 0 {
                "same@example.com".to_string()
            } else {
                format!("other{n}@example.com")
            };
            register(&app, &email, "correct horse").await
        }));
    }
    let mut created = Vec::new();
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            (StatusCode::CREATED, body) => created.push(body),
            (StatusCode::BAD_REQUEST, _) => rejected += 1,
            (status, body) => panic!("unexpected {status}: {body}"),
        }
    }
    assert_eq!(created.len(), 5);
    assert_eq!(rejected, 3);
    assert_eq!(
        created
            .iter()
            .filter(|b| b["user"]["role"] == "superadmin")
            .count(),
        1
    );
}

#[tokio::test]
async fn unknown_account_fails_like_a_bad_password() {
    let t = setup_unseeded();
    let (status, body) = call(Method::POST, "/auth/login")
        .json(json!({ "email": "ghost@example.com", "password": "whatever" }))
        .send(&t.app)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");

    let entries = t.stores.audit.all().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::LoginFailed);
    assert_eq!(entries[0].user_id, None);
}

#[tokio::test]
async fn outdated_hash_is_upgraded_on_login() {
    let t = setup_unseeded();
    let old_policy = PasswordPolicy {
        memory_kib: 2048,
        iterations: 1,
        parallelism: 1,
        output_len: 32,
    };
    let old_hash = password::hash_password("correct horse", None, &old_policy).unwrap();
    t.stores.users.put(UserAccount {
        id: "legacy-user".into(),
        email_encrypted: t.core.vault.encrypt("old@example.com").unwrap(),
        email_hash: t.core.vault.hash_for_lookup("old@example.com").unwrap(),
        name: None,
        password_hash: Some(old_hash.clone()),
        role: Role::User,
    });

    let (status, _) = call(Method::POST, "/auth/login")
        .json(json!({ "email": "old@example.com", "password": "correct horse" }))
        .send(&t.app)
        .await;
    assert_eq!(status, StatusCode::OK);

    let stored = t.stores.users.find_by_id("legacy-user").await.unwrap().unwrap();
    let fresh = stored.password_hash.unwrap();
    assert_ne!(fresh, old_hash);
    assert!(!t.core.vault.needs_rehash(&fresh));

    let actions: Vec<_> = t.stores.audit.all().await.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::PasswordRehashed, AuditAction::LoginSuccess]
    );
}
