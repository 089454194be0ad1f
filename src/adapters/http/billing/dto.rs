//! HTTP DTOs for billing endpoints.
//!
//! Field names follow the gateway's camelCase convention, which is also what
//! the practice-management front end sends.

use chrono::NaiveDate;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::handlers::billing::{
    CancelSubscriptionResult, CreateChargeResult, CreateSubscriptionResult,
    SubscriptionStatusView, WebhookSecretView, WEBHOOK_PATH,
};
use crate::domain::billing::{
    BillingType, Cadence, CompanySubscription, FlowStatus, SubscriptionState,
};
use crate::domain::foundation::{CompanyId, CredentialId, Timestamp};
use crate::ports::SubscriptionPayment;

fn iso(ts: Option<Timestamp>) -> Option<String> {
    ts.map(|t| t.as_datetime().to_rfc3339())
}

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to charge a financial flow.
///
/// `financialFlowId` and `value` are accepted as numbers or strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChargeRequest {
    pub financial_flow_id: Value,
    pub billing_type: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub credit_card_token: Option<String>,
    #[serde(default)]
    pub integration_key_id: Option<CredentialId>,
}

/// Request to put a company on a paid plan.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub company_id: CompanyId,
    pub plan_id: i64,
    pub value: Value,
    pub billing_type: String,
    #[serde(default)]
    pub cadence: Cadence,
    #[serde(default)]
    pub with_trial: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request to switch a company's plan off. At least one field is required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSubscriptionRequest {
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Acknowledgement returned to the gateway for every webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}

impl WebhookAck {
    pub fn received() -> Self {
        Self { received: true }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeResponse {
    pub id: String,
    pub financial_flow_id: String,
    pub credential_id: Option<String>,
    pub asaas_charge_id: String,
    pub billing_type: BillingType,
    pub status: String,
    pub flow_status: FlowStatus,
    pub due_date: NaiveDate,
    pub value: f64,
    pub pix_payload: Option<String>,
    pub pix_qr_code: Option<String>,
    pub boleto_url: Option<String>,
    pub card_last4: Option<String>,
    pub card_brand: Option<String>,
    pub created_at: String,
}

impl From<CreateChargeResult> for ChargeResponse {
    fn from(result: CreateChargeResult) -> Self {
        let charge = result.charge;
        Self {
            id: charge.id.to_string(),
            financial_flow_id: charge.financial_flow_id.to_string(),
            credential_id: charge.credential_id.map(|c| c.to_string()),
            asaas_charge_id: charge.gateway_charge_id,
            billing_type: charge.billing_type,
            status: charge.status,
            flow_status: result.flow_status,
            due_date: charge.due_date,
            value: charge.value,
            pix_payload: charge.artifacts.pix_payload,
            pix_qr_code: charge.artifacts.pix_qr_code,
            boleto_url: charge.artifacts.boleto_url,
            card_last4: charge.artifacts.card_last4,
            card_brand: charge.artifacts.card_brand,
            created_at: charge.created_at.as_datetime().to_rfc3339(),
        }
    }
}

/// A company's subscription columns plus the state derived from them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub company_id: CompanyId,
    pub plan_id: Option<i64>,
    pub active: bool,
    pub cadence: Cadence,
    pub state: SubscriptionState,
    pub grants_access: bool,
    pub trial_started_at: Option<String>,
    pub trial_ends_at: Option<String>,
    pub current_period_start: Option<String>,
    pub current_period_end: Option<String>,
    pub grace_expires_at: Option<String>,
    pub asaas_subscription_id: Option<String>,
    pub asaas_customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_cancelled: Option<bool>,
}

impl SubscriptionResponse {
    fn build(subscription: CompanySubscription, state: SubscriptionState) -> Self {
        Self {
            company_id: subscription.company_id,
            plan_id: subscription.plan_id,
            active: subscription.active,
            cadence: subscription.cadence,
            state,
            grants_access: state.grants_access(),
            trial_started_at: iso(subscription.trial_started_at),
            trial_ends_at: iso(subscription.trial_ends_at),
            current_period_start: iso(subscription.current_period_start),
            current_period_end: iso(subscription.current_period_end),
            grace_expires_at: iso(subscription.grace_expires_at),
            asaas_subscription_id: subscription.gateway_subscription_id,
            asaas_customer_id: subscription.gateway_customer_id,
            evaluated_at: None,
            gateway_cancelled: None,
        }
    }
}

impl From<SubscriptionStatusView> for SubscriptionResponse {
    fn from(view: SubscriptionStatusView) -> Self {
        let mut response = Self::build(view.subscription, view.state);
        response.evaluated_at = iso(Some(view.evaluated_at));
        response
    }
}

impl From<CreateSubscriptionResult> for SubscriptionResponse {
    fn from(result: CreateSubscriptionResult) -> Self {
        Self::build(result.subscription, result.state)
    }
}

impl From<CancelSubscriptionResult> for SubscriptionResponse {
    fn from(result: CancelSubscriptionResult) -> Self {
        let mut response = Self::build(result.subscription, result.state);
        response.gateway_cancelled = Some(result.gateway_cancelled);
        response
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPaymentsResponse {
    pub company_id: CompanyId,
    pub payments: Vec<SubscriptionPayment>,
}

/// Operator view of a credential's webhook configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSecretResponse {
    pub credential_id: String,
    pub environment: String,
    pub webhook_secret: Option<String>,
    pub source: &'static str,
    pub configuration_url: String,
    pub webhook_path: &'static str,
    pub instructions: Vec<String>,
}

impl From<WebhookSecretView> for WebhookSecretResponse {
    fn from(view: WebhookSecretView) -> Self {
        Self {
            credential_id: view.credential_id.to_string(),
            environment: view.environment.as_str().to_string(),
            webhook_secret: view.secret.map(|s| s.expose_secret().to_string()),
            source: view.source.as_str(),
            configuration_url: view.configuration_url,
            webhook_path: WEBHOOK_PATH,
            instructions: view.instructions,
        }
    }
}

/// Error body for internal API failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn charge_request_accepts_loose_identifiers() {
        let request: CreateChargeRequest = serde_json::from_value(json!({
            "financialFlowId": "42",
            "billingType": "pix",
            "value": "150,00"
        }))
        .unwrap();
        assert_eq!(request.financial_flow_id, json!("42"));
        assert_eq!(request.value, json!("150,00"));
        assert!(request.integration_key_id.is_none());
    }

    #[test]
    fn subscription_request_defaults_to_monthly_without_trial() {
        let request: CreateSubscriptionRequest = serde_json::from_value(json!({
            "companyId": 7,
            "planId": 2,
            "value": 99.9,
            "billingType": "BOLETO"
        }))
        .unwrap();
        assert_eq!(request.cadence, Cadence::Monthly);
        assert!(!request.with_trial);
    }

    #[test]
    fn status_response_serializes_state_in_snake_case() {
        let subscription = CompanySubscription::unprovisioned(CompanyId::new(3).unwrap());
        let response = SubscriptionResponse::build(subscription, SubscriptionState::GracePeriod);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["state"], "grace_period");
        assert_eq!(json["grantsAccess"], true);
        assert_eq!(json["companyId"], 3);
        assert!(json.get("gatewayCancelled").is_none());
    }
}
