//! Payment gateway port for the outbound gateway API.
//!
//! One client is bound to one resolved credential; the factory builds a
//! client per credential because companies bill through their own accounts.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::domain::billing::{BillingType, Cadence, GatewayApiError, ResolvedCredential};

/// Customer data sent on create/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRequest {
    pub name: String,
    pub email: Option<String>,
    pub cpf_cnpj: Option<String>,
    pub external_reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayCustomer {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateChargeRequest {
    pub customer: String,
    pub billing_type: BillingType,
    pub value: f64,
    pub due_date: NaiveDate,
    pub description: Option<String>,
    pub external_reference: String,
    pub credit_card_token: Option<String>,
    pub remote_ip: Option<String>,
}

/// A charge as returned by the gateway. `raw` keeps the full response for
/// artifact extraction and storage.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayCharge {
    pub id: String,
    pub status: String,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub customer: String,
    pub billing_type: BillingType,
    pub value: f64,
    pub next_due_date: NaiveDate,
    pub cadence: Cadence,
    pub description: Option<String>,
    pub external_reference: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySubscription {
    pub id: String,
    pub status: String,
    pub deleted: bool,
    pub raw: Value,
}

/// One payment generated by a gateway subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPayment {
    pub id: String,
    pub status: String,
    pub value: Option<f64>,
    pub due_date: Option<NaiveDate>,
    pub payment_date: Option<NaiveDate>,
    pub billing_type: Option<String>,
    pub invoice_url: Option<String>,
}

/// Outbound gateway API bound to one credential.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_customer(
        &self,
        request: &CustomerRequest,
    ) -> Result<GatewayCustomer, GatewayApiError>;

    async fn update_customer(
        &self,
        customer_id: &str,
        request: &CustomerRequest,
    ) -> Result<GatewayCustomer, GatewayApiError>;

    async fn create_charge(
        &self,
        request: &CreateChargeRequest,
    ) -> Result<GatewayCharge, GatewayApiError>;

    /// PIX payload and QR image of a charge.
    async fn get_pix_qr_code(&self, charge_id: &str) -> Result<Value, GatewayApiError>;

    async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<GatewaySubscription, GatewayApiError>;

    async fn update_subscription(
        &self,
        subscription_id: &str,
        request: &SubscriptionRequest,
    ) -> Result<GatewaySubscription, GatewayApiError>;

    /// Returns `None` when the gateway does not know the subscription.
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<GatewaySubscription>, GatewayApiError>;

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), GatewayApiError>;

    async fn list_subscription_payments(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<SubscriptionPayment>, GatewayApiError>;
}

/// Builds gateway clients for resolved credentials.
pub trait GatewayClientFactory: Send + Sync {
    fn client_for(&self, credential: &ResolvedCredential) -> Arc<dyn PaymentGateway>;
}
