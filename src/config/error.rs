//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Database statement timeout must be positive")]
    InvalidStatementTimeout,

    #[error("Request timeout {request_secs}s cannot cover two gateway calls of {gateway_secs}s")]
    RequestTimeoutTooShort { request_secs: u64, gateway_secs: u64 },

    #[error("Unknown gateway environment: {0}")]
    InvalidGatewayEnvironment(String),

    #[error("Invalid IP address in webhook allowlist: {0}")]
    InvalidAllowedIp(String),

    #[error("Invalid plan payment account id: {0}")]
    InvalidPlanAccount(String),

    #[error("Invalid gateway timeout: {0}")]
    InvalidGatewayTimeout(String),
}
