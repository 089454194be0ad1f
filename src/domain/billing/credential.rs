//! Gateway credentials and their scoping rules.

use url::Url;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{CompanyId, CredentialId, ValidationError};

/// Provider name stored on credential rows.
pub const PROVIDER: &str = "asaas";

const PRODUCTION_API_URL: &str = "https://www.asaas.com/api/v3";
const SANDBOX_API_URL: &str = "https://sandbox.asaas.com/api/v3";
const PRODUCTION_WEB_URL: &str = "https://www.asaas.com";
const SANDBOX_WEB_URL: &str = "https://sandbox.asaas.com";

/// Gateway environment a credential talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayEnvironment {
    Producao,
    #[default]
    Homologacao,
}

impl GatewayEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayEnvironment::Producao => "producao",
            GatewayEnvironment::Homologacao => "homologacao",
        }
    }

    /// API base URL used when a credential has none stored.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            GatewayEnvironment::Producao => PRODUCTION_API_URL,
            GatewayEnvironment::Homologacao => SANDBOX_API_URL,
        }
    }

    /// Web dashboard host for this environment.
    pub fn web_url(&self) -> &'static str {
        match self {
            GatewayEnvironment::Producao => PRODUCTION_WEB_URL,
            GatewayEnvironment::Homologacao => SANDBOX_WEB_URL,
        }
    }
}

impl fmt::Display for GatewayEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GatewayEnvironment {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "producao" | "produção" | "production" | "prod" => Ok(GatewayEnvironment::Producao),
            "homologacao" | "homologação" | "sandbox" | "staging" => {
                Ok(GatewayEnvironment::Homologacao)
            }
            other => Err(ValidationError::invalid_format(
                "environment",
                format!("unknown gateway environment '{}'", other),
            )),
        }
    }
}

/// Which credential rows a lookup may consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeFilter {
    /// Rows owned by the company, or marked global.
    CompanyOrGlobal(CompanyId),
    /// Global rows only.
    GlobalOnly,
    /// Any active row for the provider.
    Any,
}

impl ScopeFilter {
    /// Company whose own credentials sort first, if any.
    pub fn preferred_company(&self) -> Option<CompanyId> {
        match self {
            ScopeFilter::CompanyOrGlobal(id) => Some(*id),
            _ => None,
        }
    }

    pub fn admits(&self, credential: &GatewayCredential) -> bool {
        match self {
            ScopeFilter::CompanyOrGlobal(id) => {
                credential.is_global || credential.company_id == Some(*id)
            }
            ScopeFilter::GlobalOnly => credential.is_global,
            ScopeFilter::Any => true,
        }
    }
}

/// A stored gateway credential row.
#[derive(Debug, Clone)]
pub struct GatewayCredential {
    pub id: CredentialId,
    pub api_url: Option<String>,
    pub access_token: SecretString,
    pub webhook_secret: Option<SecretString>,
    pub environment: GatewayEnvironment,
    pub company_id: Option<CompanyId>,
    pub is_global: bool,
    pub active: bool,
}

impl GatewayCredential {
    /// Whether `company` may use this credential.
    pub fn usable_by(&self, company: Option<CompanyId>) -> bool {
        self.is_global || (company.is_some() && self.company_id == company)
    }

    pub fn resolve(&self) -> ResolvedCredential {
        ResolvedCredential {
            base_url: normalize_base_url(self.api_url.as_deref(), self.environment),
            access_token: self.access_token.clone(),
            credential_id: Some(self.id),
            environment: self.environment,
        }
    }
}

/// Everything needed to call the gateway.
#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    pub base_url: String,
    pub access_token: SecretString,
    /// `None` for the process-wide fallback credential.
    pub credential_id: Option<CredentialId>,
    pub environment: GatewayEnvironment,
}

/// Canonicalizes a stored API URL.
///
/// Gateway hosts become `<scheme>://<host>/api/v<n>` (v3 unless the stored
/// path names another version). Other hosts pass through trimmed. Empty or
/// missing input yields the environment default.
pub fn normalize_base_url(raw: Option<&str>, environment: GatewayEnvironment) -> String {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return environment.default_base_url().to_string();
    }

    let url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(_) => return trimmed.trim_end_matches('/').to_string(),
    };

    let host = match url.host_str() {
        Some(host) => host.to_ascii_lowercase(),
        None => return trimmed.trim_end_matches('/').to_string(),
    };

    if host != "asaas.com" && !host.ends_with(".asaas.com") {
        return trimmed.trim_end_matches('/').to_string();
    }

    let version = url
        .path_segments()
        .and_then(|mut segments| {
            segments.find_map(|segment| {
                segment
                    .strip_prefix('v')
                    .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| "3".to_string());

    let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
    format!("{}://{}{}/api/v{}", url.scheme(), host, port, version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn credential(company: Option<i64>, is_global: bool) -> GatewayCredential {
        GatewayCredential {
            id: CredentialId::new(),
            api_url: None,
            access_token: SecretString::new("tok".to_string()),
            webhook_secret: None,
            environment: GatewayEnvironment::Homologacao,
            company_id: company.map(|id| CompanyId::new(id).unwrap()),
            is_global,
            active: true,
        }
    }

    #[test]
    fn empty_url_uses_environment_default() {
        assert_eq!(
            normalize_base_url(None, GatewayEnvironment::Producao),
            "https://www.asaas.com/api/v3"
        );
        assert_eq!(
            normalize_base_url(Some("  "), GatewayEnvironment::Homologacao),
            "https://sandbox.asaas.com/api/v3"
        );
    }

    #[test]
    fn gateway_host_is_canonicalized() {
        assert_eq!(
            normalize_base_url(Some("https://sandbox.asaas.com/"), GatewayEnvironment::Producao),
            "https://sandbox.asaas.com/api/v3"
        );
        assert_eq!(
            normalize_base_url(
                Some("https://WWW.asaas.com/api/v3/payments"),
                GatewayEnvironment::Producao
            ),
            "https://www.asaas.com/api/v3"
        );
        assert_eq!(
            normalize_base_url(Some("https://api.asaas.com/v4"), GatewayEnvironment::Producao),
            "https://api.asaas.com/api/v4"
        );
    }

    #[test]
    fn foreign_host_passes_through() {
        assert_eq!(
            normalize_base_url(
                Some("http://localhost:8089/mock/api/"),
                GatewayEnvironment::Homologacao
            ),
            "http://localhost:8089/mock/api"
        );
        assert_eq!(
            normalize_base_url(Some("not a url"), GatewayEnvironment::Homologacao),
            "not a url"
        );
    }

    #[test]
    fn environment_parses_aliases() {
        assert_eq!(
            "PRODUCAO".parse::<GatewayEnvironment>().unwrap(),
            GatewayEnvironment::Producao
        );
        assert_eq!(
            "sandbox".parse::<GatewayEnvironment>().unwrap(),
            GatewayEnvironment::Homologacao
        );
        assert!("qa".parse::<GatewayEnvironment>().is_err());
    }

    #[test]
    fn scope_filter_admits() {
        let company = CompanyId::new(7).unwrap();
        let own = credential(Some(7), false);
        let other = credential(Some(8), false);
        let global = credential(None, true);

        let scoped = ScopeFilter::CompanyOrGlobal(company);
        assert!(scoped.admits(&own));
        assert!(!scoped.admits(&other));
        assert!(scoped.admits(&global));

        assert!(!ScopeFilter::GlobalOnly.admits(&own));
        assert!(ScopeFilter::GlobalOnly.admits(&global));
        assert!(ScopeFilter::Any.admits(&other));
    }

    #[test]
    fn usable_by_requires_ownership_unless_global() {
        let company = CompanyId::new(7).unwrap();
        assert!(credential(Some(7), false).usable_by(Some(company)));
        assert!(!credential(Some(8), false).usable_by(Some(company)));
        assert!(!credential(Some(8), false).usable_by(None));
        assert!(credential(None, true).usable_by(None));
    }

    #[test]
    fn resolve_carries_id_and_token() {
        let cred = credential(Some(7), false);
        let resolved = cred.resolve();
        assert_eq!(resolved.credential_id, Some(cred.id));
        assert_eq!(resolved.access_token.expose_secret(), "tok");
        assert_eq!(resolved.base_url, "https://sandbox.asaas.com/api/v3");
    }
}
