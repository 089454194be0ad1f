//! CreateChargeHandler - issues a gateway charge for a financial flow.
//!
//! At most one charge exists per flow. A lookup before the gateway call
//! avoids creating a gateway charge that could never be stored; the unique
//! constraint behind `insert_with_flow_status` is what actually enforces it.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tracing::{info, warn};

use super::credential_resolver::CredentialResolver;
use crate::domain::billing::extract::{extract_artifacts, merge_pix_qr_code};
use crate::domain::billing::identifiers::{normalize_amount, normalize_flow_id};
use crate::domain::billing::{
    map_flow_status, BillingError, BillingType, FinancialFlow, FlowStatus, LocalCharge,
    ResolvedCredential,
};
use crate::domain::foundation::{ChargeId, CredentialId, Timestamp};
use crate::ports::{
    ChargeRepository, CreateChargeRequest, CredentialStore, GatewayClientFactory, SaveResult,
};

/// Command to create a charge. Identifier and amount arrive loosely typed
/// and are normalized by the handler.
#[derive(Debug, Clone)]
pub struct CreateChargeCommand {
    pub financial_flow_id: Value,
    pub billing_type: String,
    pub value: Value,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
    /// Gateway customer; defaults to the one registered for the flow's client.
    pub customer_id: Option<String>,
    pub credit_card_token: Option<String>,
    /// Explicit credential to bill through.
    pub integration_key_id: Option<CredentialId>,
    pub remote_ip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateChargeResult {
    pub charge: LocalCharge,
    pub flow_status: FlowStatus,
}

pub struct CreateChargeHandler {
    charges: Arc<dyn ChargeRepository>,
    credentials: Arc<dyn CredentialStore>,
    resolver: Arc<CredentialResolver>,
    gateways: Arc<dyn GatewayClientFactory>,
}

impl CreateChargeHandler {
    pub fn new(
        charges: Arc<dyn ChargeRepository>,
        credentials: Arc<dyn CredentialStore>,
        resolver: Arc<CredentialResolver>,
        gateways: Arc<dyn GatewayClientFactory>,
    ) -> Self {
        Self {
            charges,
            credentials,
            resolver,
            gateways,
        }
    }

    pub async fn handle(&self, cmd: CreateChargeCommand) -> Result<CreateChargeResult, BillingError> {
        // 1. Validate and normalize input
        let billing_type: BillingType = cmd.billing_type.parse()?;
        let card_token = cmd
            .credit_card_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        if billing_type.requires_card_token() && card_token.is_none() {
            return Err(BillingError::validation(
                "creditCardToken",
                format!("{} charges require a card token", billing_type),
            ));
        }
        let flow_id = normalize_flow_id(&cmd.financial_flow_id)?;
        let value = normalize_amount(&cmd.value)?;

        // 2. Load the flow and reject a second charge early
        let flow = self
            .charges
            .find_flow(&flow_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("financial flow {}", flow_id)))?;

        if self.charges.find_by_flow_id(&flow_id).await?.is_some() {
            return Err(BillingError::conflict(&flow_id));
        }

        // 3. Pick the credential and the customer
        let credential = self.select_credential(&flow, cmd.integration_key_id).await?;
        let customer = cmd
            .customer_id
            .filter(|c| !c.trim().is_empty())
            .or_else(|| flow.gateway_customer_id.clone())
            .ok_or_else(|| {
                BillingError::validation("customerId", "no gateway customer for this client")
            })?;

        // 4. Create the charge on the gateway
        let gateway = self.gateways.client_for(&credential);
        let due_date = cmd
            .due_date
            .or(flow.due_date)
            .unwrap_or_else(|| Utc::now().date_naive());
        let request = CreateChargeRequest {
            customer,
            billing_type,
            value,
            due_date,
            description: cmd.description.or_else(|| flow.description.clone()),
            external_reference: flow_id.as_key(),
            credit_card_token: card_token,
            remote_ip: cmd.remote_ip,
        };
        let created = gateway.create_charge(&request).await?;

        // 5. Collect payment artifacts
        let mut artifacts = extract_artifacts(&created.raw);
        if billing_type == BillingType::Pix && artifacts.pix_incomplete() {
            match gateway.get_pix_qr_code(&created.id).await {
                Ok(qr) => merge_pix_qr_code(&mut artifacts, &qr),
                Err(e) => warn!(charge_id = %created.id, error = %e, "PIX QR code fetch failed"),
            }
        }

        // 6. Persist charge and flow status together
        let flow_status = map_flow_status(&created.status);
        let now = Timestamp::now();
        let charge = LocalCharge {
            id: ChargeId::new(),
            financial_flow_id: flow_id,
            credential_id: credential.credential_id,
            gateway_charge_id: created.id.clone(),
            billing_type,
            status: created.status.clone(),
            due_date,
            value,
            artifacts,
            last_event: None,
            raw_payload: created.raw,
            paid_at: (flow_status == FlowStatus::Pago).then_some(now),
            created_at: now,
            updated_at: now,
        };

        match self
            .charges
            .insert_with_flow_status(&charge, flow_status)
            .await?
        {
            SaveResult::Inserted => {
                info!(
                    flow_id = %flow_id,
                    charge_id = %charge.gateway_charge_id,
                    billing_type = %billing_type,
                    "Charge created"
                );
                Ok(CreateChargeResult {
                    charge,
                    flow_status,
                })
            }
            SaveResult::AlreadyExists => {
                warn!(
                    flow_id = %flow_id,
                    charge_id = %charge.gateway_charge_id,
                    "Concurrent charge won the insert, gateway charge left unlinked"
                );
                Err(BillingError::conflict(&flow_id))
            }
        }
    }

    /// Explicit key, then the flow's company integration, then the
    /// process-wide credential.
    async fn select_credential(
        &self,
        flow: &FinancialFlow,
        explicit: Option<CredentialId>,
    ) -> Result<ResolvedCredential, BillingError> {
        if let Some(id) = explicit {
            let stored = self
                .credentials
                .find_by_id(id)
                .await?
                .filter(|c| c.active)
                .ok_or_else(|| {
                    BillingError::validation("integrationKeyId", "integration key not found or inactive")
                })?;
            if !stored.usable_by(flow.company_id) {
                return Err(BillingError::validation(
                    "integrationKeyId",
                    "integration key belongs to another company",
                ));
            }
            return Ok(stored.resolve());
        }

        if let Some(company) = flow.company_id {
            match self.resolver.resolve(Some(company), None).await {
                Ok(resolved) => return Ok(resolved),
                Err(BillingError::IntegrationNotConfigured(_)) => {}
                Err(other) => return Err(other),
            }
        }

        self.resolver.fallback().cloned().ok_or_else(|| {
            BillingError::IntegrationNotConfigured(format!(
                "no gateway credential available for financial flow {}",
                flow.id
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::asaas::{MockGatewayFactory, MockPaymentGateway};
    use crate::adapters::memory::InMemoryBillingStore;
    use crate::application::handlers::billing::CredentialPolicy;
    use crate::domain::billing::{GatewayApiError, GatewayCredential, GatewayEnvironment};
    use crate::domain::foundation::{ClienteId, CompanyId, FinancialFlowId};
    use secrecy::SecretString;
    use serde_json::json;

    // ════════════════════════════════════════════════════════════════════════════
    // Fixtures
    // ════════════════════════════════════════════════════════════════════════════

    struct Harness {
        store: InMemoryBillingStore,
        factory: MockGatewayFactory,
        handler: CreateChargeHandler,
    }

    fn harness(fallback: Option<ResolvedCredential>) -> Harness {
        let store = InMemoryBillingStore::new();
        let factory = MockGatewayFactory::new(MockPaymentGateway::new());
        let resolver = Arc::new(CredentialResolver::new(
            Arc::new(store.clone()),
            CredentialPolicy {
                allow_legacy_fallback: false,
                fallback,
            },
        ));
        let handler = CreateChargeHandler::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            resolver,
            Arc::new(factory.clone()),
        );
        Harness {
            store,
            factory,
            handler,
        }
    }

    fn company(id: i64) -> CompanyId {
        CompanyId::new(id).unwrap()
    }

    fn flow(id: i64, company_id: i64) -> FinancialFlow {
        FinancialFlow {
            id: FinancialFlowId::Numeric(id),
            company_id: Some(company(company_id)),
            cliente_id: Some(ClienteId::from_i64(5)),
            gateway_customer_id: Some("cus_client".to_string()),
            description: Some("Honorários".to_string()),
            due_date: NaiveDate::from_ymd_opt(2026, 4, 10),
            value: Some(250.0),
            status: FlowStatus::Pendente,
            external_provider: None,
            external_reference_id: None,
        }
    }

    fn stored_credential(owner: Option<i64>, is_global: bool) -> GatewayCredential {
        GatewayCredential {
            id: CredentialId::new(),
            api_url: None,
            access_token: SecretString::new("tok".to_string()),
            webhook_secret: None,
            environment: GatewayEnvironment::Homologacao,
            company_id: owner.map(company),
            is_global,
            active: true,
        }
    }

    fn command(flow_id: Value, billing_type: &str) -> CreateChargeCommand {
        CreateChargeCommand {
            financial_flow_id: flow_id,
            billing_type: billing_type.to_string(),
            value: json!(250.0),
            due_date: None,
            description: None,
            customer_id: None,
            credit_card_token: None,
            integration_key_id: None,
            remote_ip: None,
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Validation
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn rejects_unknown_billing_type() {
        let h = harness(None);
        let err = h.handler.handle(command(json!(1), "TRANSFER")).await.unwrap_err();
        assert!(matches!(err, BillingError::Validation { .. }));
    }

    #[tokio::test]
    async fn card_charge_requires_token() {
        let h = harness(None);
        let mut cmd = command(json!(1), "CREDIT_CARD");
        cmd.credit_card_token = Some("  ".to_string());
        match h.handler.handle(cmd).await.unwrap_err() {
            BillingError::Validation { field, .. } => assert_eq!(field, "creditCardToken"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!h.factory.gateway().was_called("create_charge"));
    }

    #[tokio::test]
    async fn rejects_malformed_flow_id_and_value() {
        let h = harness(None);
        let err = h.handler.handle(command(json!("abc"), "PIX")).await.unwrap_err();
        assert!(matches!(err, BillingError::Validation { .. }));

        let mut cmd = command(json!(1), "PIX");
        cmd.value = json!("NaN");
        let err = h.handler.handle(cmd).await.unwrap_err();
        assert!(matches!(err, BillingError::Validation { .. }));
    }

    #[tokio::test]
    async fn missing_flow_is_not_found() {
        let h = harness(None);
        let err = h.handler.handle(command(json!(404), "PIX")).await.unwrap_err();
        assert!(matches!(err, BillingError::NotFound(_)));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Creation
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn creates_pix_charge_and_fetches_qr_code() {
        let h = harness(None);
        h.store.add_flow(flow(1, 1));
        let cred = stored_credential(Some(1), false);
        h.store.add_credential(cred.clone());

        let result = h.handler.handle(command(json!("1"), "pix")).await.unwrap();

        assert_eq!(result.flow_status, FlowStatus::Pendente);
        assert_eq!(result.charge.credential_id, Some(cred.id));
        assert_eq!(result.charge.due_date, NaiveDate::from_ymd_opt(2026, 4, 10).unwrap());
        assert!(result.charge.artifacts.pix_payload.is_some());
        assert!(result.charge.artifacts.pix_qr_code.is_some());
        assert!(h.factory.gateway().was_called("get_pix_qr_code"));

        let calls = h.factory.gateway().calls();
        let create = calls.iter().find(|c| c.method == "create_charge").unwrap();
        assert_eq!(create.args, vec!["cus_client", "PIX", "1"]);

        let stored = h.store.flow(&FinancialFlowId::Numeric(1)).unwrap();
        assert_eq!(stored.external_reference_id, Some(result.charge.gateway_charge_id));
        assert_eq!(stored.external_provider.as_deref(), Some("asaas"));
    }

    #[tokio::test]
    async fn confirmed_card_charge_marks_flow_paid() {
        let h = harness(None);
        h.store.add_flow(flow(2, 1));
        h.store.add_credential(stored_credential(None, true));
        h.factory.gateway().set_charge_response(json!({
            "id": "pay_card",
            "status": "CONFIRMED",
            "creditCard": {"creditCardNumber": "4242", "creditCardBrand": "VISA"}
        }));

        let mut cmd = command(json!(2), "CREDIT_CARD");
        cmd.credit_card_token = Some("tok_card".to_string());
        let result = h.handler.handle(cmd).await.unwrap();

        assert_eq!(result.flow_status, FlowStatus::Pago);
        assert!(result.charge.paid_at.is_some());
        assert_eq!(result.charge.artifacts.card_last4.as_deref(), Some("4242"));
        assert_eq!(
            h.store.flow(&FinancialFlowId::Numeric(2)).unwrap().status,
            FlowStatus::Pago
        );
    }

    #[tokio::test]
    async fn second_charge_for_same_flow_conflicts() {
        let h = harness(None);
        h.store.add_flow(flow(3, 1));
        h.store.add_credential(stored_credential(Some(1), false));

        let first = h.handler.handle(command(json!(3), "BOLETO")).await.unwrap();
        let err = h.handler.handle(command(json!("3"), "BOLETO")).await.unwrap_err();

        assert!(matches!(err, BillingError::ChargeConflict { .. }));
        let charges = h.store.charges_for_flow(&FinancialFlowId::Numeric(3));
        assert_eq!(charges.len(), 1);
        assert_eq!(charges[0].id, first.charge.id);
        assert_eq!(h.factory.gateway().call_count("create_charge"), 1);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Credential Selection
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn explicit_key_of_other_company_is_rejected() {
        let h = harness(None);
        h.store.add_flow(flow(4, 1));
        let foreign = stored_credential(Some(2), false);
        h.store.add_credential(foreign.clone());

        let mut cmd = command(json!(4), "PIX");
        cmd.integration_key_id = Some(foreign.id);
        match h.handler.handle(cmd).await.unwrap_err() {
            BillingError::Validation { field, .. } => assert_eq!(field, "integrationKeyId"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn explicit_global_key_is_accepted() {
        let h = harness(None);
        h.store.add_flow(flow(5, 1));
        let global = stored_credential(None, true);
        h.store.add_credential(global.clone());
        h.store.add_credential(stored_credential(Some(1), false));

        let mut cmd = command(json!(5), "BOLETO");
        cmd.integration_key_id = Some(global.id);
        let result = h.handler.handle(cmd).await.unwrap();
        assert_eq!(result.charge.credential_id, Some(global.id));
    }

    #[tokio::test]
    async fn falls_back_to_process_credential() {
        let h = harness(Some(ResolvedCredential {
            base_url: "https://sandbox.asaas.com/api/v3".to_string(),
            access_token: SecretString::new("env".to_string()),
            credential_id: None,
            environment: GatewayEnvironment::Homologacao,
        }));
        h.store.add_flow(flow(6, 1));

        let result = h.handler.handle(command(json!(6), "BOLETO")).await.unwrap();
        assert!(result.charge.credential_id.is_none());
        assert_eq!(h.factory.requested_credentials()[0].0, None);
    }

    #[tokio::test]
    async fn no_credential_is_integration_not_configured() {
        let h = harness(None);
        h.store.add_flow(flow(7, 1));
        let err = h.handler.handle(command(json!(7), "BOLETO")).await.unwrap_err();
        assert!(matches!(err, BillingError::IntegrationNotConfigured(_)));
    }

    #[tokio::test]
    async fn gateway_error_is_surfaced_and_nothing_stored() {
        let h = harness(None);
        h.store.add_flow(flow(8, 1));
        h.store.add_credential(stored_credential(Some(1), false));
        h.factory.gateway().set_method_error(
            "create_charge",
            GatewayApiError {
                status: Some(400),
                code: Some("invalid_customer".to_string()),
                message: "Cliente inválido".to_string(),
                body: None,
            },
        );

        let err = h.handler.handle(command(json!(8), "PIX")).await.unwrap_err();
        assert!(matches!(err, BillingError::Gateway(_)));
        assert_eq!(h.store.charge_count(), 0);
    }
}
