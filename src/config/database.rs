//! Postgres settings for the billing store
//!
//! Each webhook delivery holds one connection for its whole reconciliation
//! transaction (advisory lock, charge, flow and company rows), so the pool is
//! sized for gateway bursts and every statement runs under a server-side
//! timeout that bounds how long the lock can be held.

use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use std::time::Duration;

use super::error::ValidationError;

const MAX_POOL_SIZE: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `postgres://` connection URL of the practice-management database
    pub url: String,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Upper bound on concurrent reconciliations plus API requests
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a request waits for a free connection before failing
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Session `statement_timeout`
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_secs: u64,

    /// Apply the bundled `migrations/` on startup
    #[serde(default)]
    pub run_migrations: bool,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Statement run on every new pooled connection.
    pub fn session_setup(&self) -> String {
        format!(
            "SET statement_timeout = {}",
            self.statement_timeout_secs * 1000
        )
    }

    /// Opens the pool; each connection gets the session setup applied.
    pub async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        let setup = self.session_setup();
        PgPoolOptions::new()
            .min_connections(self.min_connections)
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout())
            .after_connect(move |conn, _meta| {
                let setup = setup.clone();
                Box::pin(async move {
                    conn.execute(setup.as_str()).await?;
                    Ok(())
                })
            })
            .connect(&self.url)
            .await
    }

    /// Applies the bundled migrations when enabled
    pub async fn migrate(&self, pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        if !self.run_migrations {
            return Ok(());
        }
        sqlx::migrate!("./migrations").run(pool).await
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.trim().is_empty() {
            return Err(ValidationError::MissingRequired("PRACTICE_BILLING__DATABASE__URL"));
        }
        if !self.url.starts_with("postgres://") && !self.url.starts_with("postgresql://") {
            return Err(ValidationError::InvalidDatabaseUrl);
        }
        if self.max_connections == 0 || self.min_connections > self.max_connections {
            return Err(ValidationError::InvalidPoolSize);
        }
        if self.max_connections > MAX_POOL_SIZE {
            return Err(ValidationError::PoolSizeTooLarge);
        }
        if self.statement_timeout_secs == 0 {
            return Err(ValidationError::InvalidStatementTimeout);
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            statement_timeout_secs: default_statement_timeout(),
            run_migrations: false,
        }
    }
}

fn default_min_connections() -> u32 {
    1
}

// Gateways retry in bursts after an outage.
fn default_max_connections() -> u32 {
    20
}

fn default_acquire_timeout() -> u64 {
    3
}

fn default_statement_timeout() -> u64 {
    10
}
