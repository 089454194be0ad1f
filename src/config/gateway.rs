//! Payment gateway configuration
//!
//! Read from the unprefixed `ASAAS_*` variables shared with the rest of the
//! practice-management deployment.

use std::net::IpAddr;
use std::time::Duration;

use secrecy::SecretString;

use super::error::ValidationError;
use crate::domain::billing::{normalize_base_url, GatewayEnvironment, ResolvedCredential};
use crate::domain::foundation::CompanyId;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

/// Gateway settings and the process-wide fallback credential
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Signing secret used when no stored credential carries one
    pub webhook_secret: Option<SecretString>,

    /// Source addresses allowed to post webhooks; empty allows all
    pub webhook_allowed_ips: Vec<IpAddr>,

    /// Check the allowlist against `X-Forwarded-For` instead of the peer.
    /// Only safe behind a proxy that overwrites the header.
    pub webhook_trust_forwarded: bool,

    /// Let credential lookups relax scope and environment
    pub allow_legacy_fallback: bool,

    pub environment: GatewayEnvironment,

    /// Base URL of the fallback credential
    pub api_url: Option<String>,

    /// Token of the fallback credential
    pub access_token: Option<SecretString>,

    /// Company whose credential bills platform plans
    pub plan_account_id: Option<CompanyId>,

    pub http_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            webhook_secret: None,
            webhook_allowed_ips: Vec::new(),
            webhook_trust_forwarded: false,
            allow_legacy_fallback: false,
            environment: GatewayEnvironment::default(),
            api_url: None,
            access_token: None,
            plan_account_id: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl GatewayConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads:
    /// - `ASAAS_WEBHOOK_SECRET`
    /// - `ASAAS_WEBHOOK_ALLOWED_IPS` (comma-separated)
    /// - `ASAAS_WEBHOOK_TRUST_FORWARDED_FOR`
    /// - `ASAAS_ALLOW_LEGACY_CREDENTIAL_FALLBACK`
    /// - `ASAAS_ENVIRONMENT`
    /// - `ASAAS_API_URL`, `ASAAS_ACCESS_TOKEN` / `ASAAS_API_KEY`
    /// - `PLAN_PAYMENT_ACCOUNT_ID`
    /// - `ASAAS_HTTP_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let environment = match get("ASAAS_ENVIRONMENT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ValidationError::InvalidGatewayEnvironment(raw))?,
            None => GatewayEnvironment::default(),
        };

        let webhook_allowed_ips = get("ASAAS_WEBHOOK_ALLOWED_IPS")
            .map(|raw| parse_ip_list(&raw))
            .transpose()?
            .unwrap_or_default();

        let plan_account_id = get("PLAN_PAYMENT_ACCOUNT_ID")
            .map(|raw| {
                raw.parse::<CompanyId>()
                    .map_err(|_| ValidationError::InvalidPlanAccount(raw))
            })
            .transpose()?;

        let http_timeout_secs = match get("ASAAS_HTTP_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => return Err(ValidationError::InvalidGatewayTimeout(raw)),
            },
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(Self {
            webhook_secret: get("ASAAS_WEBHOOK_SECRET").map(SecretString::new),
            webhook_allowed_ips,
            webhook_trust_forwarded: get("ASAAS_WEBHOOK_TRUST_FORWARDED_FOR")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
            allow_legacy_fallback: get("ASAAS_ALLOW_LEGACY_CREDENTIAL_FALLBACK")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
            environment,
            api_url: get("ASAAS_API_URL"),
            access_token: get("ASAAS_ACCESS_TOKEN")
                .or_else(|| get("ASAAS_API_KEY"))
                .map(SecretString::new),
            plan_account_id,
            http_timeout_secs,
        })
    }

    /// The credential built from `ASAAS_API_URL` and the token, if a token is set
    pub fn fallback_credential(&self) -> Option<ResolvedCredential> {
        self.access_token.as_ref().map(|token| ResolvedCredential {
            base_url: normalize_base_url(self.api_url.as_deref(), self.environment),
            access_token: token.clone(),
            credential_id: None,
            environment: self.environment,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn parse_ip_list(raw: &str) -> Result<Vec<IpAddr>, ValidationError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<IpAddr>()
                .map_err(|_| ValidationError::InvalidAllowedIp(entry.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<GatewayConfig, ValidationError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert!(config.webhook_secret.is_none());
        assert!(config.webhook_allowed_ips.is_empty());
        assert!(!config.webhook_trust_forwarded);
        assert!(!config.allow_legacy_fallback);
        assert_eq!(config.environment, GatewayEnvironment::Homologacao);
        assert_eq!(config.http_timeout(), Duration::from_secs(15));
        assert!(config.fallback_credential().is_none());
    }

    #[test]
    fn test_full_configuration() {
        let config = load(&[
            ("ASAAS_WEBHOOK_SECRET", "whsec"),
            ("ASAAS_WEBHOOK_ALLOWED_IPS", "52.67.12.206, 18.230.8.159"),
            ("ASAAS_WEBHOOK_TRUST_FORWARDED_FOR", "true"),
            ("ASAAS_ALLOW_LEGACY_CREDENTIAL_FALLBACK", "yes"),
            ("ASAAS_ENVIRONMENT", "producao"),
            ("ASAAS_API_URL", "https://www.asaas.com/api/v3/"),
            ("ASAAS_API_KEY", "$aact_prod"),
            ("PLAN_PAYMENT_ACCOUNT_ID", "1"),
            ("ASAAS_HTTP_TIMEOUT_SECS", "20"),
        ])
        .unwrap();

        assert_eq!(config.webhook_secret.unwrap().expose_secret(), "whsec");
        assert_eq!(config.webhook_allowed_ips.len(), 2);
        assert!(config.webhook_trust_forwarded);
        assert!(config.allow_legacy_fallback);
        assert_eq!(config.environment, GatewayEnvironment::Producao);
        assert_eq!(config.plan_account_id, Some(CompanyId::new(1).unwrap()));
        assert_eq!(config.http_timeout_secs, 20);
    }

    #[test]
    fn test_access_token_wins_over_api_key() {
        let config = load(&[("ASAAS_ACCESS_TOKEN", "token"), ("ASAAS_API_KEY", "key")]).unwrap();
        let fallback = config.fallback_credential().unwrap();
        assert_eq!(fallback.access_token.expose_secret(), "token");
        assert_eq!(fallback.base_url, "https://sandbox.asaas.com/api/v3");
        assert!(fallback.credential_id.is_none());
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = load(&[("ASAAS_WEBHOOK_SECRET", "  "), ("ASAAS_ACCESS_TOKEN", "")]).unwrap();
        assert!(config.webhook_secret.is_none());
        assert!(config.access_token.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            load(&[("ASAAS_ENVIRONMENT", "mars")]),
            Err(ValidationError::InvalidGatewayEnvironment(_))
        ));
        assert!(matches!(
            load(&[("ASAAS_WEBHOOK_ALLOWED_IPS", "10.0.0.1,nope")]),
            Err(ValidationError::InvalidAllowedIp(_))
        ));
        assert!(matches!(
            load(&[("PLAN_PAYMENT_ACCOUNT_ID", "-3")]),
            Err(ValidationError::InvalidPlanAccount(_))
        ));
        assert!(matches!(
            load(&[("ASAAS_HTTP_TIMEOUT_SECS", "0")]),
            Err(ValidationError::InvalidGatewayTimeout(_))
        ));
    }
}
