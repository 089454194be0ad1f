//! Asaas REST client.
//!
//! Implements `PaymentGateway` against the Asaas v3 API for one resolved
//! credential. The bearer secret travels in the `access_token` header.
//!
//! # Configuration
//!
//! ```ignore
//! let factory = AsaasClientFactory::new(Duration::from_secs(15))?;
//! let gateway = factory.client_for(&resolved_credential);
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::types::{
    api_error, raw_str, AsaasChargeBody, AsaasCustomerBody, AsaasIdResponse, AsaasList,
    AsaasSubscriptionBody,
};
use crate::domain::billing::{GatewayApiError, ResolvedCredential};
use crate::ports::{
    CreateChargeRequest, CustomerRequest, GatewayCharge, GatewayClientFactory, GatewayCustomer,
    GatewaySubscription, PaymentGateway, SubscriptionPayment, SubscriptionRequest,
};

const USER_AGENT: &str = concat!("practice-billing/", env!("CARGO_PKG_VERSION"));

/// Asaas API client bound to one credential.
pub struct AsaasClient {
    http_client: reqwest::Client,
    base_url: String,
    access_token: SecretString,
}

impl AsaasClient {
    pub fn new(http_client: reqwest::Client, credential: &ResolvedCredential) -> Self {
        Self {
            http_client,
            base_url: credential.base_url.trim_end_matches('/').to_string(),
            access_token: credential.access_token.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, self.endpoint(path))
            .header("access_token", self.access_token.expose_secret())
            .header(reqwest::header::USER_AGENT, USER_AGENT)
    }

    /// Sends the request and returns the JSON body of a 2xx response.
    async fn send(&self, request: RequestBuilder) -> Result<Value, GatewayApiError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, timeout = e.is_timeout(), "Gateway request failed");
            GatewayApiError::transport(if e.is_timeout() {
                "gateway request timed out".to_string()
            } else {
                e.to_string()
            })
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayApiError::transport(format!("failed to read gateway response: {}", e)))?;

        if !status.is_success() {
            let error = api_error(status.as_u16(), text);
            tracing::warn!(
                status = status.as_u16(),
                code = ?error.code,
                message = %error.message,
                "Gateway rejected request"
            );
            return Err(error);
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| GatewayApiError {
            status: Some(status.as_u16()),
            code: None,
            message: format!("failed to parse gateway response: {}", e),
            body: Some(text),
        })
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Value, GatewayApiError> {
        self.send(self.request(method, path).json(body)).await
    }

    fn decode<T: DeserializeOwned>(raw: Value) -> Result<T, GatewayApiError> {
        serde_json::from_value(raw).map_err(|e| GatewayApiError {
            status: None,
            code: None,
            message: format!("unexpected gateway response shape: {}", e),
            body: None,
        })
    }

    fn subscription_from(raw: Value) -> Result<GatewaySubscription, GatewayApiError> {
        let id = raw_str(&raw, "id").ok_or_else(|| GatewayApiError {
            status: None,
            code: None,
            message: "gateway subscription response has no id".to_string(),
            body: Some(raw.to_string()),
        })?;
        Ok(GatewaySubscription {
            id,
            status: raw_str(&raw, "status").unwrap_or_default(),
            deleted: raw.get("deleted").and_then(Value::as_bool).unwrap_or(false),
            raw,
        })
    }
}

#[async_trait]
impl PaymentGateway for AsaasClient {
    async fn create_customer(
        &self,
        request: &CustomerRequest,
    ) -> Result<GatewayCustomer, GatewayApiError> {
        let raw = self
            .send_json(Method::POST, "customers", &AsaasCustomerBody::from(request))
            .await?;
        let created: AsaasIdResponse = Self::decode(raw)?;
        Ok(GatewayCustomer { id: created.id })
    }

    async fn update_customer(
        &self,
        customer_id: &str,
        request: &CustomerRequest,
    ) -> Result<GatewayCustomer, GatewayApiError> {
        let raw = self
            .send_json(
                Method::PUT,
                &format!("customers/{}", customer_id),
                &AsaasCustomerBody::from(request),
            )
            .await?;
        let updated: AsaasIdResponse = Self::decode(raw)?;
        Ok(GatewayCustomer { id: updated.id })
    }

    async fn create_charge(
        &self,
        request: &CreateChargeRequest,
    ) -> Result<GatewayCharge, GatewayApiError> {
        let raw = self
            .send_json(Method::POST, "payments", &AsaasChargeBody::from(request))
            .await?;
        let id = raw_str(&raw, "id").ok_or_else(|| GatewayApiError {
            status: None,
            code: None,
            message: "gateway charge response has no id".to_string(),
            body: Some(raw.to_string()),
        })?;
        tracing::debug!(charge_id = %id, "Gateway charge created");
        Ok(GatewayCharge {
            id,
            status: raw_str(&raw, "status").unwrap_or_else(|| "PENDING".to_string()),
            raw,
        })
    }

    async fn get_pix_qr_code(&self, charge_id: &str) -> Result<Value, GatewayApiError> {
        self.send(self.request(Method::GET, &format!("payments/{}/pixQrCode", charge_id)))
            .await
    }

    async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<GatewaySubscription, GatewayApiError> {
        let raw = self
            .send_json(
                Method::POST,
                "subscriptions",
                &AsaasSubscriptionBody::from(request),
            )
            .await?;
        Self::subscription_from(raw)
    }

    async fn update_subscription(
        &self,
        subscription_id: &str,
        request: &SubscriptionRequest,
    ) -> Result<GatewaySubscription, GatewayApiError> {
        let raw = self
            .send_json(
                Method::PUT,
                &format!("subscriptions/{}", subscription_id),
                &AsaasSubscriptionBody::from(request),
            )
            .await?;
        Self::subscription_from(raw)
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<GatewaySubscription>, GatewayApiError> {
        match self
            .send(self.request(Method::GET, &format!("subscriptions/{}", subscription_id)))
            .await
        {
            Ok(raw) => Self::subscription_from(raw).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), GatewayApiError> {
        self.send(self.request(Method::DELETE, &format!("subscriptions/{}", subscription_id)))
            .await?;
        Ok(())
    }

    async fn list_subscription_payments(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<SubscriptionPayment>, GatewayApiError> {
        let raw = self
            .send(self.request(
                Method::GET,
                &format!("subscriptions/{}/payments", subscription_id),
            ))
            .await?;
        let page: AsaasList<SubscriptionPayment> = Self::decode(raw)?;
        Ok(page.data)
    }
}

/// Builds `AsaasClient`s sharing one connection pool.
#[derive(Clone)]
pub struct AsaasClientFactory {
    http_client: reqwest::Client,
}

impl AsaasClientFactory {
    /// Every request made through the factory's clients is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { http_client })
    }
}

impl GatewayClientFactory for AsaasClientFactory {
    fn client_for(&self, credential: &ResolvedCredential) -> Arc<dyn PaymentGateway> {
        Arc::new(AsaasClient::new(self.http_client.clone(), credential))
    }
}
