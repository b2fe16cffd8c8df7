//! API server configuration.

use std::net::IpAddr;

use aegis_core::auth::jwt::resolve_jwt_secret;
use tracing::warn;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3200").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Reverse proxies whose `X-Forwarded-For` / `X-Real-IP` headers are
    /// honored. Requests from any other peer are attributed to the peer.
    pub trusted_proxies: Vec<IpAddr>,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable       | Default                           |
    /// |----------------|-----------------------------------|
    /// | `BIND_ADDR`    | `127.0.0.1:3200`                  |
    /// | `DATABASE_URL` | `postgres://localhost:5432/aegis` |
    /// | `JWT_SECRET`   | generated & persisted to file     |
    /// | `TRUSTED_PROXIES` | empty (forwarding headers ignored) |
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3200".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/aegis".into()),
            jwt_secret: resolve_jwt_secret(),
            trusted_proxies: std::env::var("TRUSTED_PROXIES")
                .map(|v| parse_proxy_list(&v))
                .unwrap_or_default(),
        }
    }
}

/// Comma-separated IP addresses. Unparsable entries are skipped.
pub fn parse_proxy_list(value: &str) -> Vec<IpAddr> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                warn!(entry = s, "ignoring invalid TRUSTED_PROXIES entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_list_skips_garbage() {
        assert_eq!(
            parse_proxy_list(" 10.0.0.1, nope,,::1 "),
            vec![
                "10.0.0.1".parse::<IpAddr>().unwrap(),
                "::1".parse::<IpAddr>().unwrap()
            ]
        );
    }
}
