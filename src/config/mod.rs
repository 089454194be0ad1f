//! Application configuration module
//!
//! Server and database settings are loaded with the `PRACTICE_BILLING_`
//! prefix using the `config` and `dotenvy` crates; nested values use double
//! underscores as separators. Gateway settings keep their unprefixed
//! `ASAAS_*` names, see [`GatewayConfig::from_env`].
//!
//! # Example
//!
//! ```no_run
//! use practice_billing::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod gateway;
mod server;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use gateway::GatewayConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Listener configuration (bind address, environment, request timeout)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Payment gateway configuration (`ASAAS_*` variables)
    #[serde(skip)]
    pub gateway: GatewayConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `PRACTICE_BILLING` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Reads the gateway variables
    ///
    /// # Environment Variable Format
    ///
    /// - `PRACTICE_BILLING__SERVER__PORT=3001` -> `server.port = 3001`
    /// - `PRACTICE_BILLING__DATABASE__URL=...` -> `database.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config: AppConfig = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("PRACTICE_BILLING")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.gateway = GatewayConfig::from_env()?;
        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        if !self.server.covers_gateway_calls(self.gateway.http_timeout()) {
            return Err(ValidationError::RequestTimeoutTooShort {
                request_secs: self.server.request_timeout_secs,
                gateway_secs: self.gateway.http_timeout_secs,
            });
        }
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var("PRACTICE_BILLING__DATABASE__URL", "postgresql://test@localhost/test");
    }

    fn clear_env() {
        env::remove_var("PRACTICE_BILLING__DATABASE__URL");
        env::remove_var("PRACTICE_BILLING__SERVER__PORT");
        env::remove_var("PRACTICE_BILLING__SERVER__ENVIRONMENT");
        env::remove_var("ASAAS_ENVIRONMENT");
        env::remove_var("ASAAS_HTTP_TIMEOUT_SECS");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.database.url, "postgresql://test@localhost/test");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.environment, Environment::Development);
    }

    #[test]
    fn test_is_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("PRACTICE_BILLING__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().is_production());
    }

    #[test]
    fn test_gateway_section_is_read() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("ASAAS_ENVIRONMENT", "producao");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(
            config.gateway.environment,
            crate::domain::billing::GatewayEnvironment::Producao
        );
    }

    #[test]
    fn test_slow_gateway_needs_longer_request_timeout() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("ASAAS_HTTP_TIMEOUT_SECS", "20");
        let result = AppConfig::load();
        clear_env();

        assert_eq!(
            result.unwrap().validate(),
            Err(ValidationError::RequestTimeoutTooShort {
                request_secs: 30,
                gateway_secs: 20
            })
        );
    }

    #[test]
    fn test_invalid_gateway_variable_fails_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("ASAAS_ENVIRONMENT", "mars");
        let result = AppConfig::load();
        clear_env();

        assert!(matches!(result, Err(ConfigError::ValidationFailed(_))));
    }
}
