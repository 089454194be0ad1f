//! ListSubscriptionPaymentsHandler - payments generated by a company's plan.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::domain::foundation::CompanyId;
use crate::ports::{CompanyDirectory, GatewayClientFactory, SubscriptionPayment};

use super::credential_resolver::CredentialResolver;

pub struct ListSubscriptionPaymentsHandler {
    companies: Arc<dyn CompanyDirectory>,
    resolver: Arc<CredentialResolver>,
    gateways: Arc<dyn GatewayClientFactory>,
    plan_account: Option<CompanyId>,
}

impl ListSubscriptionPaymentsHandler {
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

    /// Empty when the company has no gateway subscription.
    pub async fn handle(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<SubscriptionPayment>, BillingError> {
        let subscription = self
            .companies
            .load_subscription(company_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("company {}", company_id)))?;

        let Some(remote_id) = subscription.gateway_subscription_id else {
            return Ok(Vec::new());
        };

        let credential = self.resolver.resolve(self.plan_account, None).await?;
        let payments = self
            .gateways
            .client_for(&credential)
            .list_subscription_payments(&remote_id)
            .await?;
        Ok(payments)
    }
}
