//! CancelSubscriptionHandler - switches a company's plan off.
//!
//! The company is found through the payload steps of the resolution chain,
//! so callers may identify it by id, `empresa-<id>` reference, gateway
//! subscription id or gateway customer id.

use std::sync::Arc;

use tracing::{info, warn};

use super::company_resolution::{CompanyHints, CompanyResolutionChain};
use super::credential_resolver::CredentialResolver;
use crate::domain::billing::{BillingError, CompanySubscription, SubscriptionState};
use crate::domain::foundation::{CompanyId, Timestamp};
use crate::ports::{CompanyDirectory, GatewayClientFactory};

#[derive(Debug, Clone, Default)]
pub struct CancelSubscriptionCommand {
    pub company_id: Option<CompanyId>,
    pub external_reference: Option<String>,
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CancelSubscriptionResult {
    pub subscription: CompanySubscription,
    pub state: SubscriptionState,
    /// Whether a cancel call reached the gateway.
    pub gateway_cancelled: bool,
}

pub struct CancelSubscriptionHandler {
    chain: Arc<CompanyResolutionChain>,
    companies: Arc<dyn CompanyDirectory>,
    resolver: Arc<CredentialResolver>,
    gateways: Arc<dyn GatewayClientFactory>,
    plan_account: Option<CompanyId>,
}

impl CancelSubscriptionHandler {
    pub fn new(
        chain: Arc<CompanyResolutionChain>,
        companies: Arc<dyn CompanyDirectory>,
        resolver: Arc<CredentialResolver>,
        gateways: Arc<dyn GatewayClientFactory>,
        plan_account: Option<CompanyId>,
    ) -> Self {
        Self {
            chain,
            companies,
            resolver,
            gateways,
            plan_account,
        }
    }

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<CancelSubscriptionResult, BillingError> {
        let hints = CompanyHints {
            explicit: cmd.company_id,
            metadata: None,
            external_reference: cmd.external_reference,
            subscription_id: cmd.subscription_id,
            customer_id: cmd.customer_id,
        };
        if hints.explicit.is_none()
            && hints.external_reference.is_none()
            && hints.subscription_id.is_none()
            && hints.customer_id.is_none()
        {
            return Err(BillingError::validation(
                "companyId",
                "a company id, reference, subscription id or customer id is required",
            ));
        }

        let company_id = self
            .chain
            .resolve_from_payload(&hints)
            .await?
            .ok_or_else(|| BillingError::NotFound("no company matches the request".to_string()))?;

        let mut subscription = self
            .companies
            .load_subscription(company_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("company {}", company_id)))?;

        let mut gateway_cancelled = false;
        if let Some(remote_id) = subscription.gateway_subscription_id.clone() {
            let credential = self.resolver.resolve(self.plan_account, None).await?;
            let gateway = self.gateways.client_for(&credential);

            let remote = match gateway.get_subscription(&remote_id).await {
                Ok(remote) => remote,
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e.into()),
            };

            match remote {
                Some(remote) if !remote.deleted => {
                    gateway.cancel_subscription(&remote_id).await?;
                    gateway_cancelled = true;
                }
                _ => {
                    warn!(
                        company_id = %company_id,
                        subscription_id = %remote_id,
                        "Gateway subscription already removed, skipping cancel call"
                    );
                }
            }
        }

        subscription.cancel();
        self.companies.save_subscription(&subscription).await?;

        let state = subscription.resolve_state(Timestamp::now());
        info!(
            company_id = %company_id,
            gateway_cancelled = gateway_cancelled,
            "Subscription cancelled"
        );

        Ok(CancelSubscriptionResult {
            subscription,
            state,
            gateway_cancelled,
        })
    }
}
