//! CreateSubscriptionHandler - provisions a platform plan for a company.
//!
//! Plans are billed through the platform's own gateway account: the
//! credential of the configured plan account company, or the global one.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use super::credential_resolver::CredentialResolver;
use crate::domain::billing::identifiers::normalize_amount;
use crate::domain::billing::{
    BillingError, BillingType, Cadence, CompanyProfile, CompanySubscription, SubscriptionState,
};
use crate::domain::foundation::{CompanyId, Timestamp};
use crate::ports::{
    CompanyDirectory, CustomerRequest, GatewayClientFactory, PaymentGateway, SubscriptionRequest,
};

#[derive(Debug, Clone)]
pub struct CreateSubscriptionCommand {
    pub company_id: CompanyId,
    pub plan_id: i64,
    pub value: Value,
    pub billing_type: String,
    pub cadence: Cadence,
    /// Start with a trial window when no paid period exists yet.
    pub with_trial: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateSubscriptionResult {
    pub subscription: CompanySubscription,
    pub state: SubscriptionState,
}

pub struct CreateSubscriptionHandler {
    companies: Arc<dyn CompanyDirectory>,
    resolver: Arc<CredentialResolver>,
    gateways: Arc<dyn GatewayClientFactory>,
    plan_account: Option<CompanyId>,
}

/// External reference the gateway echoes back on plan payments.
pub fn company_reference(company_id: CompanyId) -> String {
    format!("empresa-{}", company_id)
}

impl CreateSubscriptionHandler {
    pub fn new(
        companies: Arc<dyn CompanyDirectory>,
        resolver: Arc<CredentialResolver>,
        gateways: Arc<dyn GatewayClientFactory>,
        plan_account: Option<CompanyId>,
    ) -> Self {
        Self {
            companies,
            resolver,
            gateways,
            plan_account,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateSubscriptionCommand,
    ) -> Result<CreateSubscriptionResult, BillingError> {
        self.handle_at(cmd, Timestamp::now()).await
    }

    pub async fn handle_at(
        &self,
        cmd: CreateSubscriptionCommand,
        now: Timestamp,
    ) -> Result<CreateSubscriptionResult, BillingError> {
        if cmd.plan_id <= 0 {
            return Err(BillingError::validation("planId", "must be a positive integer"));
        }
        let billing_type: BillingType = cmd.billing_type.parse()?;
        let value = normalize_amount(&cmd.value)?;

        let profile = self
            .companies
            .find_profile(cmd.company_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("company {}", cmd.company_id)))?;
        let mut subscription = self
            .companies
            .load_subscription(cmd.company_id)
            .await?
            .unwrap_or_else(|| CompanySubscription::unprovisioned(cmd.company_id));

        let credential = self.resolver.resolve(self.plan_account, None).await?;
        let gateway = self.gateways.client_for(&credential);

        let customer_id = self.ensure_customer(gateway.as_ref(), &profile, &subscription).await?;

        subscription.provision(cmd.plan_id, cmd.cadence, cmd.with_trial, now);
        let next_due_date = if cmd.with_trial {
            subscription.trial_ends_at.unwrap_or(now).date()
        } else {
            now.date()
        };

        let request = SubscriptionRequest {
            customer: customer_id.clone(),
            billing_type,
            value,
            next_due_date,
            cadence: cmd.cadence,
            description: cmd.description,
            external_reference: company_reference(cmd.company_id),
        };

        let remote = match subscription.gateway_subscription_id.as_deref() {
            Some(existing) => match gateway.update_subscription(existing, &request).await {
                Ok(updated) => updated,
                Err(e) if e.is_not_found() => {
                    warn!(
                        company_id = %cmd.company_id,
                        subscription_id = %existing,
                        "Stored gateway subscription is gone, creating a new one"
                    );
                    gateway.create_subscription(&request).await?
                }
                Err(e) => return Err(e.into()),
            },
            None => gateway.create_subscription(&request).await?,
        };

        subscription.gateway_customer_id = Some(customer_id);
        subscription.gateway_subscription_id = Some(remote.id);
        self.companies.save_subscription(&subscription).await?;

        let state = subscription.resolve_state(now);
        info!(
            company_id = %cmd.company_id,
            plan_id = cmd.plan_id,
            cadence = %cmd.cadence.as_str(),
            state = %state,
            "Subscription provisioned"
        );

        Ok(CreateSubscriptionResult {
            subscription,
            state,
        })
    }

    async fn ensure_customer(
        &self,
        gateway: &dyn PaymentGateway,
        profile: &CompanyProfile,
        subscription: &CompanySubscription,
    ) -> Result<String, BillingError> {
        let request = CustomerRequest {
            name: profile.name.clone(),
            email: profile.email.clone(),
            cpf_cnpj: profile.document_digits(),
            external_reference: Some(company_reference(profile.id)),
        };

        let customer = match subscription.gateway_customer_id.as_deref() {
            Some(existing) => gateway.update_customer(existing, &request).await?,
            None => gateway.create_customer(&request).await?,
        };
        Ok(customer.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::asaas::{MockGatewayFactory, MockPaymentGateway};
    use crate::adapters::memory::InMemoryBillingStore;
    use crate::application::handlers::billing::CredentialPolicy;
    use crate::domain::billing::{GatewayApiError, GatewayCredential, GatewayEnvironment};
    use crate::domain::foundation::CredentialId;
    use chrono::{TimeZone, Utc};
    use secrecy::SecretString;
    use serde_json::json;

    fn ts(y: i32, m: u32, d: u32) -> Timestamp {
        Timestamp::from_datetime(Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap())
    }

    fn company(id: i64) -> CompanyId {
        CompanyId::new(id).unwrap()
    }

    fn credential(owner: Option<i64>, is_global: bool) -> GatewayCredential {
        GatewayCredential {
            id: CredentialId::new(),
            api_url: None,
            access_token: SecretString::new("tok".to_string()),
            webhook_secret: None,
            environment: GatewayEnvironment::Producao,
            company_id: owner.map(company),
            is_global,
            active: true,
        }
    }

    struct Harness {
        store: InMemoryBillingStore,
        factory: MockGatewayFactory,
    }

    impl Harness {
        fn new() -> Self {
            let store = InMemoryBillingStore::new();
            store.add_company(
                CompanyProfile {
                    id: company(5),
                    name: "Costa & Lima".to_string(),
                    email: Some("financeiro@costalima.adv.br".to_string()),
                    document: Some("12.345.678/0001-90".to_string()),
                },
                CompanySubscription::unprovisioned(company(5)),
            );
            Self {
                store,
                factory: MockGatewayFactory::new(MockPaymentGateway::new()),
            }
        }

        fn handler(&self, plan_account: Option<CompanyId>) -> CreateSubscriptionHandler {
            let resolver = Arc::new(CredentialResolver::new(
                Arc::new(self.store.clone()),
                CredentialPolicy::default(),
            ));
            CreateSubscriptionHandler::new(
                Arc::new(self.store.clone()),
                resolver,
                Arc::new(self.factory.clone()),
                plan_account,
            )
        }

        fn gateway(&self) -> &MockPaymentGateway {
            self.factory.gateway()
        }
    }

    fn command(with_trial: bool) -> CreateSubscriptionCommand {
        CreateSubscriptionCommand {
            company_id: company(5),
            plan_id: 3,
            value: json!("149,90"),
            billing_type: "boleto".to_string(),
            cadence: Cadence::Monthly,
            with_trial,
            description: Some("Plano Escritório".to_string()),
        }
    }

    #[tokio::test]
    async fn trial_subscription_starts_billing_at_trial_end() {
        let h = Harness::new();
        h.store.add_credential(credential(None, true));

        let result = h
            .handler(None)
            .handle_at(command(true), ts(2026, 6, 1))
            .await
            .unwrap();

        assert_eq!(result.state, SubscriptionState::Trialing);
        assert_eq!(result.subscription.trial_ends_at, Some(ts(2026, 6, 15)));

        let create = h
            .gateway()
            .calls()
            .into_iter()
            .find(|c| c.method == "create_subscription")
            .unwrap();
        assert_eq!(create.args[1], "MONTHLY");
        assert_eq!(create.args[2], "empresa-5");
        assert_eq!(create.args[3], "2026-06-15");

        let stored = h.store.subscription(company(5)).unwrap();
        assert_eq!(stored.plan_id, Some(3));
        assert!(stored.gateway_customer_id.is_some());
        assert_eq!(stored.gateway_subscription_id, result.subscription.gateway_subscription_id);
    }

    #[tokio::test]
    async fn without_trial_subscription_is_pending_and_due_today() {
        let h = Harness::new();
        h.store.add_credential(credential(None, true));

        let result = h
            .handler(None)
            .handle_at(command(false), ts(2026, 6, 1))
            .await
            .unwrap();

        assert_eq!(result.state, SubscriptionState::Pending);
        let create = h
            .gateway()
            .calls()
            .into_iter()
            .find(|c| c.method == "create_subscription")
            .unwrap();
        assert_eq!(create.args[3], "2026-06-01");
    }

    #[tokio::test]
    async fn existing_customer_and_subscription_are_updated() {
        let h = Harness::new();
        h.store.add_credential(credential(None, true));
        let mut existing = CompanySubscription::unprovisioned(company(5));
        existing.gateway_customer_id = Some("cus_old".to_string());
        existing.gateway_subscription_id = Some("sub_old".to_string());
        h.store.add_company(
            CompanyProfile {
                id: company(5),
                name: "Costa & Lima".to_string(),
                email: None,
                document: None,
            },
            existing,
        );

        let mut cmd = command(false);
        cmd.cadence = Cadence::Annual;
        h.handler(None).handle_at(cmd, ts(2026, 6, 1)).await.unwrap();

        let gateway = h.gateway();
        assert!(gateway.was_called("update_customer"));
        assert!(!gateway.was_called("create_customer"));
        assert!(gateway.was_called("update_subscription"));
        assert!(!gateway.was_called("create_subscription"));

        let stored = h.store.subscription(company(5)).unwrap();
        assert_eq!(stored.cadence, Cadence::Annual);
        assert_eq!(stored.gateway_subscription_id.as_deref(), Some("sub_old"));
    }

    #[tokio::test]
    async fn missing_remote_subscription_is_recreated() {
        let h = Harness::new();
        h.store.add_credential(credential(None, true));
        let mut existing = CompanySubscription::unprovisioned(company(5));
        existing.gateway_subscription_id = Some("sub_gone".to_string());
        h.store.add_company(
            CompanyProfile {
                id: company(5),
                name: "Costa & Lima".to_string(),
                email: None,
                document: None,
            },
            existing,
        );
        h.gateway().set_method_error(
            "update_subscription",
            GatewayApiError {
                status: Some(404),
                code: None,
                message: "not found".to_string(),
                body: None,
            },
        );

        h.handler(None).handle_at(command(false), ts(2026, 6, 1)).await.unwrap();

        assert!(h.gateway().was_called("create_subscription"));
        let stored = h.store.subscription(company(5)).unwrap();
        assert_ne!(stored.gateway_subscription_id.as_deref(), Some("sub_gone"));
    }

    #[tokio::test]
    async fn plan_account_credential_is_used() {
        let h = Harness::new();
        let platform = credential(Some(1), false);
        h.store.add_credential(platform.clone());
        h.store.add_credential(credential(None, true));

        h.handler(Some(company(1)))
            .handle_at(command(false), ts(2026, 6, 1))
            .await
            .unwrap();

        assert_eq!(h.factory.requested_credentials()[0].0, Some(platform.id));
    }

    #[tokio::test]
    async fn no_credential_is_integration_not_configured() {
        let h = Harness::new();
        let err = h
            .handler(None)
            .handle_at(command(false), ts(2026, 6, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::IntegrationNotConfigured(_)));
        assert_eq!(h.store.subscription(company(5)).unwrap().plan_id, None);
    }

    #[tokio::test]
    async fn unknown_company_is_not_found() {
        let h = Harness::new();
        h.store.add_credential(credential(None, true));
        let mut cmd = command(false);
        cmd.company_id = company(404);
        let err = h.handler(None).handle_at(cmd, ts(2026, 6, 1)).await.unwrap_err();
        assert!(matches!(err, BillingError::NotFound(_)));
    }
}
