// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use std::sync::Arc;

use aegis_core::alerts::SecurityAlertDispatcher;
use aegis_core::audit::{AuditLogger, PgAuditStore};
use aegis_core::config::SecurityConfig;
use aegis_core::crypto::CryptoVault;
use aegis_core::models::alerts::DeliveryStatus;
use aegis_core::models::audit::RetentionSweep;
use aegis_core::rate_limit::{PgRateLimitStore, RateLimiter};
use clap::Parser;
use cli::{Cli, Commands};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

mod cli;
mod logging;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    if let Err(e) = run().await {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn connect(database_url: &str) -> Result<PgPool> {
    Ok(PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await?)
}

fn rate_limiter(pool: PgPool, config: &SecurityConfig) -> RateLimiter {
    RateLimiter::new(
        Arc::new(PgRateLimitStore::new(pool)),
        config.rate_limits.clone(),
    )
}

async fn run() -> Result<()> {
    logging::init()?;

    let args = Cli::parse();

    match args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Commands::GenSecret { length } => {
            if length < 16 {
                return Err(Error::Custom("secret length must be at least 16".into()));
            }
            println!("{}", aegis_core::auth::jwt::generate_secret(length));
        }
        Commands::LookupHash { value } => {
            let vault = CryptoVault::new(&SecurityConfig::from_env()?);
            println!("{}", vault.hash_for_lookup(&value)?);
        }
        Commands::Migrate { database_url } => {
            let pool = connect(&database_url).await?;
            aegis_core::migrate::migrate(&pool).await?;
            log::info!("migrations applied");
        }
        Commands::PurgeAudit {
            days,
            only_read,
            database_url,
        } => {
            if days == 0 {
                return Err(Error::Custom("--days must be at least 1".into()));
            }
            let pool = connect(&database_url).await?;
            let logger = AuditLogger::new(Arc::new(PgAuditStore::new(pool)));
            let sweep = RetentionSweep {
                older_than: chrono::Utc::now() - chrono::Duration::days(i64::from(days)),
                only_read,
            };
            let deleted = logger.purge(sweep, None).await?;
            println!("deleted {deleted} audit entries");
        }
        Commands::PruneRateLimits { database_url } => {
            let config = SecurityConfig::from_env()?;
            let pool = connect(&database_url).await?;
            let pruned = rate_limiter(pool, &config).prune_expired().await?;
            println!("pruned {pruned} rate limit windows");
        }
        Commands::ResetRateLimit {
            identifier,
            database_url,
        } => {
            let config = SecurityConfig::from_env()?;
            let pool = connect(&database_url).await?;
            rate_limiter(pool, &config).reset(&identifier).await?;
            println!("reset {identifier}");
        }
        Commands::TestAlerts => {
            let config = SecurityConfig::from_env()?;
            let dispatcher = SecurityAlertDispatcher::from_config(&config.alerts)?;
            if dispatcher.channel_names().is_empty() {
                println!("no alert channels configured");
                return Ok(());
            }
            let report = dispatcher.self_test().await;
            let mut failed = 0;
            for outcome in &report.outcomes {
                match &outcome.status {
                    DeliveryStatus::Sent => println!("{}: sent", outcome.channel),
                    DeliveryStatus::Failed(reason) => {
                        failed += 1;
                        println!("{}: failed ({reason})", outcome.channel);
                    }
                }
            }
            if failed > 0 {
                return Err(Error::Custom(format!("{failed} alert channel(s) failed")));
            }
        }
    }

    Ok(())
}
