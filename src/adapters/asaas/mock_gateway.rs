//! Mock payment gateway for testing.
//!
//! Configurable in-memory implementation of `PaymentGateway`. Supports:
//! - Pre-configured charge responses
//! - Error injection per method
//! - Call tracking
//! - Recording which credential each client was built for

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::billing::{GatewayApiError, ResolvedCredential};
use crate::domain::foundation::CredentialId;
use crate::ports::{
    CreateChargeRequest, CustomerRequest, GatewayCharge, GatewayClientFactory, GatewayCustomer,
    GatewaySubscription, PaymentGateway, SubscriptionPayment, SubscriptionRequest,
};

/// Mock gateway. Clones share state.
#[derive(Default, Clone)]
pub struct MockPaymentGateway {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    next_charge_response: Option<Value>,
    pix_qr_code: Option<Value>,
    subscriptions: HashMap<String, GatewaySubscription>,
    subscription_payments: HashMap<String, Vec<SubscriptionPayment>>,
    method_errors: HashMap<String, GatewayApiError>,
    call_log: Vec<MethodCall>,
    sequence: u64,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Response body returned by the next `create_charge` call.
    pub fn set_charge_response(&self, response: Value) {
        self.inner.lock().unwrap().next_charge_response = Some(response);
    }

    /// Response body of `get_pix_qr_code`.
    pub fn set_pix_qr_code(&self, response: Value) {
        self.inner.lock().unwrap().pix_qr_code = Some(response);
    }

    pub fn add_subscription(&self, subscription: GatewaySubscription) {
        let id = subscription.id.clone();
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .insert(id, subscription);
    }

    pub fn set_subscription_payments(&self, subscription_id: &str, payments: Vec<SubscriptionPayment>) {
        self.inner
            .lock()
            .unwrap()
            .subscription_payments
            .insert(subscription_id.to_string(), payments);
    }

    /// Makes every call to `method` fail with `error`.
    pub fn set_method_error(&self, method: &str, error: GatewayApiError) {
        self.inner
            .lock()
            .unwrap()
            .method_errors
            .insert(method.to_string(), error);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Assertions
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.inner.lock().unwrap().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.call_count(method) > 0
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn subscription(&self, id: &str) -> Option<GatewaySubscription> {
        self.inner.lock().unwrap().subscriptions.get(id).cloned()
    }

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.inner.lock().unwrap().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), GatewayApiError> {
        match self.inner.lock().unwrap().method_errors.get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.inner.lock().unwrap();
        state.sequence += 1;
        format!("{}_{:06}", prefix, state.sequence)
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_customer(
        &self,
        request: &CustomerRequest,
    ) -> Result<GatewayCustomer, GatewayApiError> {
        self.record_call("create_customer", vec![request.name.clone()]);
        self.check_error("create_customer")?;
        Ok(GatewayCustomer {
            id: self.next_id("cus"),
        })
    }

    async fn update_customer(
        &self,
        customer_id: &str,
        request: &CustomerRequest,
    ) -> Result<GatewayCustomer, GatewayApiError> {
        self.record_call(
            "update_customer",
            vec![customer_id.to_string(), request.name.clone()],
        );
        self.check_error("update_customer")?;
        Ok(GatewayCustomer {
            id: customer_id.to_string(),
        })
    }

    async fn create_charge(
        &self,
        request: &CreateChargeRequest,
    ) -> Result<GatewayCharge, GatewayApiError> {
        self.record_call(
            "create_charge",
            vec![
                request.customer.clone(),
                request.billing_type.to_string(),
                request.external_reference.clone(),
            ],
        );
        self.check_error("create_charge")?;

        let configured = self.inner.lock().unwrap().next_charge_response.take();
        let raw = match configured {
            Some(raw) => raw,
            None => json!({
                "id": self.next_id("pay"),
                "status": "PENDING",
                "billingType": request.billing_type.as_str(),
                "value": request.value,
                "externalReference": request.external_reference,
            }),
        };

        Ok(GatewayCharge {
            id: raw["id"].as_str().unwrap_or_default().to_string(),
            status: raw["status"].as_str().unwrap_or("PENDING").to_string(),
            raw,
        })
    }

    async fn get_pix_qr_code(&self, charge_id: &str) -> Result<Value, GatewayApiError> {
        self.record_call("get_pix_qr_code", vec![charge_id.to_string()]);
        self.check_error("get_pix_qr_code")?;
        let configured = self.inner.lock().unwrap().pix_qr_code.clone();
        Ok(configured.unwrap_or_else(|| {
            json!({"payload": "00020126mockpix", "encodedImage": "iVBORw0KGgomock"})
        }))
    }

    async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<GatewaySubscription, GatewayApiError> {
        self.record_call(
            "create_subscription",
            vec![
                request.customer.clone(),
                request.cadence.gateway_cycle().to_string(),
                request.external_reference.clone(),
                request.next_due_date.to_string(),
            ],
        );
        self.check_error("create_subscription")?;

        let id = self.next_id("sub");
        let subscription = GatewaySubscription {
            id: id.clone(),
            status: "ACTIVE".to_string(),
            deleted: false,
            raw: json!({"id": id, "status": "ACTIVE"}),
        };
        self.add_subscription(subscription.clone());
        Ok(subscription)
    }

    async fn update_subscription(
        &self,
        subscription_id: &str,
        request: &SubscriptionRequest,
    ) -> Result<GatewaySubscription, GatewayApiError> {
        self.record_call(
            "update_subscription",
            vec![
                subscription_id.to_string(),
                request.cadence.gateway_cycle().to_string(),
            ],
        );
        self.check_error("update_subscription")?;

        let subscription = GatewaySubscription {
            id: subscription_id.to_string(),
            status: "ACTIVE".to_string(),
            deleted: false,
            raw: json!({"id": subscription_id, "status": "ACTIVE"}),
        };
        self.add_subscription(subscription.clone());
        Ok(subscription)
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<GatewaySubscription>, GatewayApiError> {
        self.record_call("get_subscription", vec![subscription_id.to_string()]);
        self.check_error("get_subscription")?;
        Ok(self.subscription(subscription_id))
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), GatewayApiError> {
        self.record_call("cancel_subscription", vec![subscription_id.to_string()]);
        self.check_error("cancel_subscription")?;
        let mut state = self.inner.lock().unwrap();
        if let Some(subscription) = state.subscriptions.get_mut(subscription_id) {
            subscription.deleted = true;
            subscription.status = "INACTIVE".to_string();
        }
        Ok(())
    }

    async fn list_subscription_payments(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<SubscriptionPayment>, GatewayApiError> {
        self.record_call(
            "list_subscription_payments",
            vec![subscription_id.to_string()],
        );
        self.check_error("list_subscription_payments")?;
        Ok(self
            .inner
            .lock()
            .unwrap()
            .subscription_payments
            .get(subscription_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Factory handing out one shared mock, recording each credential used.
#[derive(Default, Clone)]
pub struct MockGatewayFactory {
    gateway: MockPaymentGateway,
    requested: Arc<Mutex<Vec<(Option<CredentialId>, String)>>>,
}

impl MockGatewayFactory {
    pub fn new(gateway: MockPaymentGateway) -> Self {
        Self {
            gateway,
            requested: Arc::default(),
        }
    }

    pub fn gateway(&self) -> &MockPaymentGateway {
        &self.gateway
    }

    /// `(credential id, base url)` for every client built, in order.
    pub fn requested_credentials(&self) -> Vec<(Option<CredentialId>, String)> {
        self.requested.lock().unwrap().clone()
    }
}

impl GatewayClientFactory for MockGatewayFactory {
    fn client_for(&self, credential: &ResolvedCredential) -> Arc<dyn PaymentGateway> {
        self.requested
            .lock()
            .unwrap()
            .push((credential.credential_id, credential.base_url.clone()));
        Arc::new(self.gateway.clone())
    }
}
