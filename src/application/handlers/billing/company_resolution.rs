//! CompanyResolutionChain - maps gateway payloads to a company.
//!
//! A strict ordered fallback; each step runs only when the previous one
//! found nothing:
//!
//! 1. local charge → financial flow → company
//! 2. financial flow whose external reference is the gateway charge id
//! 3. explicit company id supplied by an internal caller
//! 4. payment metadata (`empresaId`, `companyId`, ...)
//! 5. external reference matching `empresa-<id>`
//! 6. stored gateway subscription id
//! 7. stored gateway customer id
//!
//! The chain only reads; it never writes.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::domain::billing::identifiers::{company_id_from_metadata, parse_company_reference};
use crate::domain::billing::{FinancialFlow, LocalCharge, PaymentPayload};
use crate::domain::foundation::{ClienteId, CompanyId, CredentialId, DomainError, FinancialFlowId};
use crate::ports::{ChargeRepository, CompanyDirectory};

/// What is known about the charge a webhook refers to.
#[derive(Debug, Clone, Default)]
pub struct ChargeContext {
    pub charge: Option<LocalCharge>,
    pub financial_flow_id: Option<FinancialFlowId>,
    pub cliente_id: Option<ClienteId>,
    pub company_id: Option<CompanyId>,
    pub credential_id: Option<CredentialId>,
}

impl ChargeContext {
    fn from_flow(flow: &FinancialFlow) -> Self {
        Self {
            charge: None,
            financial_flow_id: Some(flow.id),
            cliente_id: flow.cliente_id,
            company_id: flow.company_id,
            credential_id: None,
        }
    }
}

/// Payload fields that can identify a company.
#[derive(Debug, Clone, Default)]
pub struct CompanyHints {
    pub explicit: Option<CompanyId>,
    pub metadata: Option<Value>,
    pub external_reference: Option<String>,
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
}

impl CompanyHints {
    pub fn from_payment(payment: &PaymentPayload<'_>) -> Self {
        Self {
            explicit: None,
            metadata: payment.metadata().cloned(),
            external_reference: payment.external_reference(),
            subscription_id: payment.subscription(),
            customer_id: payment.customer(),
        }
    }
}

pub struct CompanyResolutionChain {
    charges: Arc<dyn ChargeRepository>,
    companies: Arc<dyn CompanyDirectory>,
}

impl CompanyResolutionChain {
    pub fn new(charges: Arc<dyn ChargeRepository>, companies: Arc<dyn CompanyDirectory>) -> Self {
        Self { charges, companies }
    }

    /// Builds the context for a gateway charge id (steps 1, 2, then the
    /// payload steps).
    pub async fn resolve_context(
        &self,
        gateway_charge_id: &str,
        hints: &CompanyHints,
    ) -> Result<ChargeContext, DomainError> {
        if let Some(charge) = self.charges.find_by_gateway_id(gateway_charge_id).await? {
            let flow = self.charges.find_flow(&charge.financial_flow_id).await?;
            let mut context = flow.as_ref().map(ChargeContext::from_flow).unwrap_or_default();
            context.financial_flow_id = Some(charge.financial_flow_id);
            context.credential_id = charge.credential_id;
            context.charge = Some(charge);
            debug!(charge_id = %gateway_charge_id, "Context resolved from local charge");
            return Ok(context);
        }

        if let Some(flow) = self
            .charges
            .find_flow_by_external_reference(gateway_charge_id)
            .await?
        {
            debug!(charge_id = %gateway_charge_id, flow_id = %flow.id, "Context resolved from flow reference");
            return Ok(ChargeContext::from_flow(&flow));
        }

        Ok(ChargeContext {
            company_id: self.resolve_from_payload(hints).await?,
            ..Default::default()
        })
    }

    /// Payload-only steps (3 to 7).
    pub async fn resolve_from_payload(
        &self,
        hints: &CompanyHints,
    ) -> Result<Option<CompanyId>, DomainError> {
        let candidates = [
            hints.explicit,
            hints.metadata.as_ref().and_then(company_id_from_metadata),
            hints
                .external_reference
                .as_deref()
                .and_then(parse_company_reference),
        ];
        for candidate in candidates.into_iter().flatten() {
            if self.companies.company_exists(candidate).await? {
                return Ok(Some(candidate));
            }
            debug!(company_id = %candidate, "Company hint does not match an existing company");
        }

        if let Some(subscription_id) = hints.subscription_id.as_deref() {
            if let Some(id) = self.companies.find_by_subscription_id(subscription_id).await? {
                return Ok(Some(id));
            }
        }

        if let Some(customer_id) = hints.customer_id.as_deref() {
            if let Some(id) = self.companies.find_by_customer_id(customer_id).await? {
                return Ok(Some(id));
            }
        }

        Ok(None)
    }

    /// Drops cached schema knowledge held by the underlying stores.
    pub fn reset_caches(&self) {
        self.companies.reset_caches();
    }
}
