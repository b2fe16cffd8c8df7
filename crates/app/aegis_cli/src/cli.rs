use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "aegis", version, about = "Aegis security operations CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the CLI version.
    Version,

    /// Print a random secret suitable for JWT_SECRET or AEGIS_ENCRYPTION_KEY.
    GenSecret {
        #[arg(long, default_value_t = 64)]
        length: usize,
    },

    /// Print the lookup hash of a value (e.g. an email) under the configured key.
    LookupHash { value: String },

    /// Apply database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },

    /// Delete audit entries older than the given number of days.
    PurgeAudit {
        #[arg(long)]
        days: u32,

        /// Only delete entries already marked as read.
        #[arg(long, default_value_t = false)]
        only_read: bool,

        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },

    /// Delete expired rate limit windows.
    PruneRateLimits {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },

    /// Clear throttling for one identifier, e.g. `login:203.0.113.7`.
    ResetRateLimit {
        identifier: String,

        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },

    /// Send a test alert to every configured channel.
    TestAlerts,
}
