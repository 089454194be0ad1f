//! GetSubscriptionStatusHandler - derives a company's subscription state.

use std::sync::Arc;

use crate::domain::billing::{BillingError, CompanySubscription, SubscriptionState};
use crate::domain::foundation::{CompanyId, Timestamp};
use crate::ports::CompanyDirectory;

#[derive(Debug, Clone)]
pub struct SubscriptionStatusView {
    pub subscription: CompanySubscription,
    pub state: SubscriptionState,
    pub grants_access: bool,
    pub evaluated_at: Timestamp,
}

pub struct GetSubscriptionStatusHandler {
    companies: Arc<dyn CompanyDirectory>,
}

impl GetSubscriptionStatusHandler {
    pub fn new(companies: Arc<dyn CompanyDirectory>) -> Self {
        Self { companies }
    }

    pub async fn handle(&self, company_id: CompanyId) -> Result<SubscriptionStatusView, BillingError> {
        self.handle_at(company_id, Timestamp::now()).await
    }

    /// State is recomputed on every call; it changes with time alone.
    pub async fn handle_at(
        &self,
        company_id: CompanyId,
        now: Timestamp,
    ) -> Result<SubscriptionStatusView, BillingError> {
        let subscription = self
            .companies
            .load_subscription(company_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("company {}", company_id)))?;

        let state = subscription.resolve_state(now);
        Ok(SubscriptionStatusView {
            subscription,
            state,
            grants_access: state.grants_access(),
            evaluated_at: now,
        })
    }
}
