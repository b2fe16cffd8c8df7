//! Aegis API server binary.
//!
//! Connects to PostgreSQL, applies migrations, assembles the security core
//! from the environment and serves the HTTP API until Ctrl-C.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use aegis_core::SecurityCore;
use aegis_core::config::SecurityConfig;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_LOG_FILTER: &str = "info,aegis_api=debug,aegis_core=debug";

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "aegis_api_server", about = "Aegis API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3200")]
    bind: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/aegis"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 10)]
    max_connections: u32,

    /// Seconds between sweeps of expired rate limit windows (0 = never).
    #[arg(long, default_value_t = 300)]
    prune_interval_secs: u64,

    /// Reverse proxies allowed to supply `X-Forwarded-For` (comma-separated).
    #[arg(long, env = "TRUSTED_PROXIES", value_delimiter = ',')]
    trusted_proxies: Vec<IpAddr>,
}

/// Periodically delete void rate limit windows until cancelled.
async fn prune_rate_limits(core: Arc<SecurityCore>, every: Duration, ct: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ct.cancelled() => break,
            _ = ticker.tick() => match core.rate_limiter.prune_expired().await {
                Ok(0) => {}
                Ok(pruned) => info!(pruned, "pruned expired rate limit windows"),
                Err(e) => warn!(error = %e, "rate limit prune failed"),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();

    info!(bind = %args.bind, "starting aegis_api_server");
    info!(max_connections = args.max_connections, "configuring connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    info!("running database migrations");
    aegis_api::migrate(&pool).await?;

    let security = SecurityConfig::from_env()?;
    let core = Arc::new(SecurityCore::postgres(pool.clone(), security)?);

    let config = aegis_api::config::ApiConfig {
        bind_addr: args.bind,
        pg_connection_url: args.database_url,
        jwt_secret: aegis_core::auth::jwt::resolve_jwt_secret(),
        trusted_proxies: args.trusted_proxies,
    };

    let state = aegis_api::AppState {
        pool,
        config: config.clone(),
        core: core.clone(),
    };
    let app = aegis_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;

    let ct = CancellationToken::new();
    let pruner = (args.prune_interval_secs > 0).then(|| {
        tokio::spawn(prune_rate_limits(
            core,
            Duration::from_secs(args.prune_interval_secs),
            ct.clone(),
        ))
    });

    info!(addr = %local_addr, trusted_proxies = ?config.trusted_proxies, "REST API listening");

    let shutdown = ct.clone();
    let api_result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
                // Without a signal handler the server runs until killed.
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
            shutdown.cancel();
        })
        .await;

    ct.cancel();
    if let Some(handle) = pruner {
        let _ = handle.await;
    }

    api_result?;

    Ok(())
}
