//! CredentialResolver - picks the gateway credential for a company.
//!
//! Lookup order, each step tried only when the previous one found nothing:
//!
//! 1. Active credentials owned by the company or marked global, filtered by
//!    the requested environment. Company-owned rows win.
//! 2. With legacy fallback enabled: any active credential in the requested
//!    environment.
//! 3. With legacy fallback enabled: any active credential at all.
//! 4. With legacy fallback enabled: the process-wide credential from the
//!    environment variables.

use std::sync::Arc;

use tracing::warn;

use crate::domain::billing::{
    BillingError, GatewayCredential, GatewayEnvironment, ResolvedCredential, ScopeFilter,
};
use crate::domain::foundation::CompanyId;
use crate::ports::CredentialStore;

/// Process-level knobs for credential resolution.
#[derive(Debug, Clone, Default)]
pub struct CredentialPolicy {
    /// Allow relaxing the company/global scope and the environment filter.
    pub allow_legacy_fallback: bool,
    /// Credential configured through environment variables.
    pub fallback: Option<ResolvedCredential>,
}

pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
    policy: CredentialPolicy,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn CredentialStore>, policy: CredentialPolicy) -> Self {
        Self { store, policy }
    }

    /// The process-wide credential, if configured.
    pub fn fallback(&self) -> Option<&ResolvedCredential> {
        self.policy.fallback.as_ref()
    }

    /// Resolves the credential for `company` (global-only when `None`).
    ///
    /// # Errors
    ///
    /// - `IntegrationNotConfigured` when every step came up empty
    /// - `Infrastructure` when the store fails
    pub async fn resolve(
        &self,
        company: Option<CompanyId>,
        environment: Option<GatewayEnvironment>,
    ) -> Result<ResolvedCredential, BillingError> {
        if let Some(credential) = self.find_stored(company, environment).await? {
            return Ok(credential.resolve());
        }

        if self.policy.allow_legacy_fallback {
            if let Some(fallback) = &self.policy.fallback {
                warn!(
                    company_id = ?company.map(|c| c.as_i64()),
                    "No stored gateway credential found, using environment credential"
                );
                return Ok(fallback.clone());
            }
        }

        Err(BillingError::IntegrationNotConfigured(match company {
            Some(id) => format!("no active gateway credential for company {}", id),
            None => "no active global gateway credential".to_string(),
        }))
    }

    /// Company-owned or global credential only. The legacy relaxation never
    /// applies here, so the result is safe to authenticate a tenant with.
    pub async fn find_scoped(
        &self,
        company: Option<CompanyId>,
        environment: Option<GatewayEnvironment>,
    ) -> Result<Option<GatewayCredential>, BillingError> {
        let scope = match company {
            Some(id) => ScopeFilter::CompanyOrGlobal(id),
            None => ScopeFilter::GlobalOnly,
        };
        self.first(scope, environment).await
    }

    /// Runs the stored-credential steps of the lookup and returns the row.
    pub async fn find_stored(
        &self,
        company: Option<CompanyId>,
        environment: Option<GatewayEnvironment>,
    ) -> Result<Option<GatewayCredential>, BillingError> {
        if let Some(found) = self.find_scoped(company, environment).await? {
            return Ok(Some(found));
        }

        if !self.policy.allow_legacy_fallback {
            return Ok(None);
        }

        warn!(
            company_id = ?company.map(|c| c.as_i64()),
            environment = ?environment,
            "No scoped gateway credential, relaxing scope"
        );
        if let Some(found) = self.first(ScopeFilter::Any, environment).await? {
            return Ok(Some(found));
        }

        if environment.is_some() {
            warn!(
                company_id = ?company.map(|c| c.as_i64()),
                "No gateway credential in requested environment, relaxing environment"
            );
            if let Some(found) = self.first(ScopeFilter::Any, None).await? {
                return Ok(Some(found));
            }
        }

        Ok(None)
    }

    async fn first(
        &self,
        scope: ScopeFilter,
        environment: Option<GatewayEnvironment>,
    ) -> Result<Option<GatewayCredential>, BillingError> {
        let mut found = self.store.find_active(scope, environment).await?;
        if found.is_empty() {
            return Ok(None);
        }
        Ok(Some(found.remove(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBillingStore;
    use crate::domain::foundation::CredentialId;
    use secrecy::{ExposeSecret, SecretString};

    fn company(id: i64) -> CompanyId {
        CompanyId::new(id).unwrap()
    }

    fn credential(
        owner: Option<i64>,
        is_global: bool,
        environment: GatewayEnvironment,
        token: &str,
    ) -> GatewayCredential {
        GatewayCredential {
            id: CredentialId::new(),
            api_url: None,
            access_token: SecretString::new(token.to_string()),
            webhook_secret: None,
            environment,
            company_id: owner.map(company),
            is_global,
            active: true,
        }
    }

    fn env_fallback() -> ResolvedCredential {
        ResolvedCredential {
            base_url: "https://sandbox.asaas.com/api/v3".to_string(),
            access_token: SecretString::new("env_token".to_string()),
            credential_id: None,
            environment: GatewayEnvironment::Homologacao,
        }
    }

    fn resolver(store: &InMemoryBillingStore, legacy: bool) -> CredentialResolver {
        CredentialResolver::new(
            Arc::new(store.clone()),
            CredentialPolicy {
                allow_legacy_fallback: legacy,
                fallback: Some(env_fallback()),
            },
        )
    }

    #[tokio::test]
    async fn prefers_company_credential_over_global() {
        let store = InMemoryBillingStore::new();
        store.add_credential(credential(Some(1), false, GatewayEnvironment::Producao, "own"));
        store.add_credential(credential(None, true, GatewayEnvironment::Producao, "global"));

        let resolved = resolver(&store, false)
            .resolve(Some(company(1)), None)
            .await
            .unwrap();
        assert_eq!(resolved.access_token.expose_secret(), "own");
        assert_eq!(resolved.base_url, "https://www.asaas.com/api/v3");
    }

    #[tokio::test]
    async fn falls_back_to_global_credential() {
        let store = InMemoryBillingStore::new();
        store.add_credential(credential(Some(2), false, GatewayEnvironment::Producao, "other"));
        store.add_credential(credential(None, true, GatewayEnvironment::Producao, "global"));

        let resolved = resolver(&store, false)
            .resolve(Some(company(1)), None)
            .await
            .unwrap();
        assert_eq!(resolved.access_token.expose_secret(), "global");
    }

    #[tokio::test]
    async fn without_legacy_flag_other_company_credential_is_never_used() {
        let store = InMemoryBillingStore::new();
        store.add_credential(credential(Some(2), false, GatewayEnvironment::Producao, "other"));

        let err = resolver(&store, false)
            .resolve(Some(company(1)), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::IntegrationNotConfigured(_)));
    }

    #[tokio::test]
    async fn legacy_flag_relaxes_scope_then_environment() {
        let store = InMemoryBillingStore::new();
        store.add_credential(credential(Some(2), false, GatewayEnvironment::Producao, "other"));

        let r = resolver(&store, true);
        let resolved = r
            .resolve(Some(company(1)), Some(GatewayEnvironment::Producao))
            .await
            .unwrap();
        assert_eq!(resolved.access_token.expose_secret(), "other");

        let resolved = r
            .resolve(Some(company(1)), Some(GatewayEnvironment::Homologacao))
            .await
            .unwrap();
        assert_eq!(resolved.access_token.expose_secret(), "other");
    }

    #[tokio::test]
    async fn environment_filter_applies_to_scoped_step() {
        let store = InMemoryBillingStore::new();
        store.add_credential(credential(Some(1), false, GatewayEnvironment::Producao, "prod"));
        store.add_credential(credential(Some(1), false, GatewayEnvironment::Homologacao, "sandbox"));

        let resolved = resolver(&store, false)
            .resolve(Some(company(1)), Some(GatewayEnvironment::Homologacao))
            .await
            .unwrap();
        assert_eq!(resolved.access_token.expose_secret(), "sandbox");
    }

    #[tokio::test]
    async fn legacy_flag_uses_environment_credential_last() {
        let store = InMemoryBillingStore::new();

        let resolved = resolver(&store, true)
            .resolve(Some(company(1)), None)
            .await
            .unwrap();
        assert_eq!(resolved.access_token.expose_secret(), "env_token");
        assert!(resolved.credential_id.is_none());
    }

    #[tokio::test]
    async fn inactive_credentials_are_skipped() {
        let store = InMemoryBillingStore::new();
        let mut inactive = credential(Some(1), false, GatewayEnvironment::Producao, "off");
        inactive.active = false;
        store.add_credential(inactive);

        let err = resolver(&store, false)
            .resolve(Some(company(1)), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::IntegrationNotConfigured(_)));
    }

    #[tokio::test]
    async fn scoped_lookup_ignores_legacy_flag() {
        let store = InMemoryBillingStore::new();
        store.add_credential(credential(Some(2), false, GatewayEnvironment::Producao, "other"));

        let r = resolver(&store, true);
        assert!(r.find_scoped(Some(company(1)), None).await.unwrap().is_none());
        assert!(r.find_stored(Some(company(1)), None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn no_company_means_global_only() {
        let store = InMemoryBillingStore::new();
        store.add_credential(credential(Some(1), false, GatewayEnvironment::Producao, "own"));
        store.add_credential(credential(None, true, GatewayEnvironment::Producao, "global"));

        let resolved = resolver(&store, false).resolve(None, None).await.unwrap();
        assert_eq!(resolved.access_token.expose_secret(), "global");
    }
}
