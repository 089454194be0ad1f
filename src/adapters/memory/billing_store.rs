//! In-memory billing store for testing.
//!
//! Implements every storage port over one mutex-guarded state, so each
//! operation is atomic just like its Postgres counterpart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::billing::{
    CompanyProfile, CompanySubscription, FinancialFlow, FlowStatus, GatewayCredential,
    GatewayEnvironment, LocalCharge, ScopeFilter, PROVIDER,
};
use crate::domain::foundation::{
    CompanyId, CredentialId, DomainError, ErrorCode, FinancialFlowId, Timestamp,
};
use crate::ports::{
    AppliedChanges, ChargeRepository, CompanyDirectory, CredentialStore, ReconciliationPlan,
    ReconciliationStore, SaveResult,
};

#[derive(Default)]
struct State {
    credentials: Vec<GatewayCredential>,
    flows: HashMap<String, FinancialFlow>,
    charges: Vec<LocalCharge>,
    companies: HashMap<CompanyId, CompanyRecord>,
    fail_reconciliation: bool,
}

struct CompanyRecord {
    profile: CompanyProfile,
    subscription: CompanySubscription,
}

/// In-memory implementation of the billing storage ports. Clones share state.
#[derive(Default, Clone)]
pub struct InMemoryBillingStore {
    state: Arc<Mutex<State>>,
    cache_resets: Arc<AtomicUsize>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Seeding
    // ════════════════════════════════════════════════════════════════════════════

    /// Adds a credential. Later additions count as more recently updated.
    pub fn add_credential(&self, credential: GatewayCredential) {
        self.state.lock().unwrap().credentials.push(credential);
    }

    pub fn add_flow(&self, flow: FinancialFlow) {
        self.state
            .lock()
            .unwrap()
            .flows
            .insert(flow.id.as_key(), flow);
    }

    pub fn add_charge(&self, charge: LocalCharge) {
        self.state.lock().unwrap().charges.push(charge);
    }

    pub fn add_company(&self, profile: CompanyProfile, subscription: CompanySubscription) {
        self.state.lock().unwrap().companies.insert(
            profile.id,
            CompanyRecord {
                profile,
                subscription,
            },
        );
    }

    /// Makes `apply` fail before writing anything.
    pub fn set_fail_reconciliation(&self, fail: bool) {
        self.state.lock().unwrap().fail_reconciliation = fail;
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Inspection
    // ════════════════════════════════════════════════════════════════════════════

    pub fn flow(&self, id: &FinancialFlowId) -> Option<FinancialFlow> {
        self.state.lock().unwrap().flows.get(&id.as_key()).cloned()
    }

    pub fn charges_for_flow(&self, id: &FinancialFlowId) -> Vec<LocalCharge> {
        self.state
            .lock()
            .unwrap()
            .charges
            .iter()
            .filter(|c| c.financial_flow_id == *id)
            .cloned()
            .collect()
    }

    pub fn charge_count(&self) -> usize {
        self.state.lock().unwrap().charges.len()
    }

    pub fn subscription(&self, id: CompanyId) -> Option<CompanySubscription> {
        self.state
            .lock()
            .unwrap()
            .companies
            .get(&id)
            .map(|r| r.subscription.clone())
    }

    pub fn cache_resets(&self) -> usize {
        self.cache_resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for InMemoryBillingStore {
    async fn find_active(
        &self,
        scope: ScopeFilter,
        environment: Option<GatewayEnvironment>,
    ) -> Result<Vec<GatewayCredential>, DomainError> {
        let state = self.state.lock().unwrap();
        let mut found: Vec<GatewayCredential> = state
            .credentials
            .iter()
            .rev()
            .filter(|c| c.active)
            .filter(|c| scope.admits(c))
            .filter(|c| environment.map_or(true, |env| c.environment == env))
            .cloned()
            .collect();

        if let Some(company) = scope.preferred_company() {
            // stable: keeps recency order inside each group
            found.sort_by_key(|c| c.company_id != Some(company));
        }
        Ok(found)
    }

    async fn find_by_id(&self, id: CredentialId) -> Result<Option<GatewayCredential>, DomainError> {
        let state = self.state.lock().unwrap();
        Ok(state.credentials.iter().find(|c| c.id == id).cloned())
    }
}

#[async_trait]
impl ChargeRepository for InMemoryBillingStore {
    async fn find_flow(&self, id: &FinancialFlowId) -> Result<Option<FinancialFlow>, DomainError> {
        Ok(self.flow(id))
    }

    async fn find_flow_by_external_reference(
        &self,
        reference: &str,
    ) -> Result<Option<FinancialFlow>, DomainError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .flows
            .values()
            .find(|f| f.external_reference_id.as_deref() == Some(reference))
            .cloned())
    }

    async fn find_by_flow_id(
        &self,
        id: &FinancialFlowId,
    ) -> Result<Option<LocalCharge>, DomainError> {
        Ok(self.charges_for_flow(id).into_iter().next())
    }

    async fn find_by_gateway_id(
        &self,
        gateway_charge_id: &str,
    ) -> Result<Option<LocalCharge>, DomainError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .charges
            .iter()
            .find(|c| c.gateway_charge_id == gateway_charge_id)
            .cloned())
    }

    async fn insert_with_flow_status(
        &self,
        charge: &LocalCharge,
        flow_status: FlowStatus,
    ) -> Result<SaveResult, DomainError> {
        let mut state = self.state.lock().unwrap();
        if state
            .charges
            .iter()
            .any(|c| c.financial_flow_id == charge.financial_flow_id)
        {
            return Ok(SaveResult::AlreadyExists);
        }

        state.charges.push(charge.clone());
        if let Some(flow) = state.flows.get_mut(&charge.financial_flow_id.as_key()) {
            flow.status = flow_status;
            flow.external_provider = Some(PROVIDER.to_string());
            flow.external_reference_id = Some(charge.gateway_charge_id.clone());
        }
        Ok(SaveResult::Inserted)
    }
}

#[async_trait]
impl CompanyDirectory for InMemoryBillingStore {
    async fn company_exists(&self, id: CompanyId) -> Result<bool, DomainError> {
        Ok(self.state.lock().unwrap().companies.contains_key(&id))
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<CompanyId>, DomainError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .companies
            .values()
            .find(|r| r.subscription.gateway_subscription_id.as_deref() == Some(subscription_id))
            .map(|r| r.profile.id))
    }

    async fn find_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<CompanyId>, DomainError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .companies
            .values()
            .find(|r| r.subscription.gateway_customer_id.as_deref() == Some(customer_id))
            .map(|r| r.profile.id))
    }

    async fn load_subscription(
        &self,
        id: CompanyId,
    ) -> Result<Option<CompanySubscription>, DomainError> {
        Ok(self.subscription(id))
    }

    async fn save_subscription(
        &self,
        subscription: &CompanySubscription,
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        match state.companies.get_mut(&subscription.company_id) {
            Some(record) => {
                record.subscription = subscription.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::CompanyNotFound,
                format!("Company {} not found", subscription.company_id),
            )),
        }
    }

    async fn find_profile(&self, id: CompanyId) -> Result<Option<CompanyProfile>, DomainError> {
        let state = self.state.lock().unwrap();
        Ok(state.companies.get(&id).map(|r| r.profile.clone()))
    }

    fn reset_caches(&self) {
        self.cache_resets.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReconciliationStore for InMemoryBillingStore {
    async fn apply(&self, plan: &ReconciliationPlan) -> Result<AppliedChanges, DomainError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_reconciliation {
            return Err(DomainError::database(
                "Failed to apply reconciliation",
                "injected failure",
            ));
        }

        let mut applied = AppliedChanges::default();
        let now = Timestamp::now();

        if let Some(update) = &plan.charge {
            if let Some(charge) = state
                .charges
                .iter_mut()
                .find(|c| c.gateway_charge_id == plan.gateway_charge_id)
            {
                charge.status = update.status.clone();
                charge.last_event = Some(update.last_event.clone());
                charge.raw_payload = update.raw_payload.clone();
                charge.paid_at = update.paid_at.or(charge.paid_at);
                charge.updated_at = now;
                applied.charge_updated = true;
            }
        }

        if let Some(update) = &plan.flow {
            if let Some(flow) = state.flows.get_mut(&update.flow_id.as_key()) {
                flow.status = update.status;
                applied.flow_updated = true;
            }
        }

        if let Some(update) = &plan.company {
            if let Some(record) = state.companies.get_mut(&update.company_id) {
                record.subscription.apply(update.change);
                applied.company_updated = true;
            }
        }

        Ok(applied)
    }
}
