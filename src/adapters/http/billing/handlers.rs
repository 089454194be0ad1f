//! HTTP handlers for billing endpoints.
//!
//! These handlers connect Axum routes to the billing application handlers.
//! The webhook endpoint is the exception to the usual error mapping: it
//! acknowledges every delivery with 202 and leaves the outcome to the logs.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use secrecy::SecretString;
use tracing::{debug, error};

use crate::adapters::http::middleware::client_ip;
use crate::application::handlers::billing::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CompanyResolutionChain,
    CreateChargeCommand, CreateChargeHandler, CreateSubscriptionCommand,
    CreateSubscriptionHandler, CredentialPolicy, CredentialResolver,
    GetSubscriptionStatusHandler, GetWebhookSecretHandler, HandleGatewayWebhookHandler,
    ListSubscriptionPaymentsHandler,
};
use crate::domain::billing::{BillingError, WebhookDelivery, SIGNATURE_HEADERS};
use crate::domain::foundation::{CompanyId, CredentialId, ValidationError};
use crate::ports::{
    ChargeRepository, CompanyDirectory, CredentialStore, GatewayClientFactory,
    ReconciliationStore,
};

use super::dto::{
    CancelSubscriptionRequest, ChargeResponse, CreateChargeRequest, CreateSubscriptionRequest,
    ErrorResponse, SubscriptionPaymentsResponse, SubscriptionResponse, WebhookAck,
    WebhookSecretResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Ports and settings the billing handlers are built from.
pub struct BillingDependencies {
    pub charges: Arc<dyn ChargeRepository>,
    pub companies: Arc<dyn CompanyDirectory>,
    pub credentials: Arc<dyn CredentialStore>,
    pub reconciliation: Arc<dyn ReconciliationStore>,
    pub gateways: Arc<dyn GatewayClientFactory>,
    pub policy: CredentialPolicy,
    /// Signing secret used when no stored credential has one.
    pub fallback_webhook_secret: Option<SecretString>,
    /// Company whose credential bills platform plans.
    pub plan_account: Option<CompanyId>,
}

/// Shared state for billing routes. Cloned per request.
#[derive(Clone)]
pub struct BillingAppState {
    pub create_charge: Arc<CreateChargeHandler>,
    pub webhook: Arc<HandleGatewayWebhookHandler>,
    pub create_subscription: Arc<CreateSubscriptionHandler>,
    pub cancel_subscription: Arc<CancelSubscriptionHandler>,
    pub subscription_status: Arc<GetSubscriptionStatusHandler>,
    pub subscription_payments: Arc<ListSubscriptionPaymentsHandler>,
    pub webhook_secret: Arc<GetWebhookSecretHandler>,
}

impl BillingAppState {
    pub fn new(deps: BillingDependencies) -> Self {
        let resolver = Arc::new(CredentialResolver::new(
            deps.credentials.clone(),
            deps.policy,
        ));
        let chain = Arc::new(CompanyResolutionChain::new(
            deps.charges.clone(),
            deps.companies.clone(),
        ));

        Self {
            create_charge: Arc::new(CreateChargeHandler::new(
                deps.charges.clone(),
                deps.credentials.clone(),
                resolver.clone(),
                deps.gateways.clone(),
            )),
            webhook: Arc::new(HandleGatewayWebhookHandler::new(
                chain.clone(),
                resolver.clone(),
                deps.credentials.clone(),
                deps.reconciliation,
                deps.fallback_webhook_secret.clone(),
            )),
            create_subscription: Arc::new(CreateSubscriptionHandler::new(
                deps.companies.clone(),
                resolver.clone(),
                deps.gateways.clone(),
                deps.plan_account,
            )),
            cancel_subscription: Arc::new(CancelSubscriptionHandler::new(
                chain,
                deps.companies.clone(),
                resolver.clone(),
                deps.gateways.clone(),
                deps.plan_account,
            )),
            subscription_status: Arc::new(GetSubscriptionStatusHandler::new(
                deps.companies.clone(),
            )),
            subscription_payments: Arc::new(ListSubscriptionPaymentsHandler::new(
                deps.companies,
                resolver,
                deps.gateways,
                deps.plan_account,
            )),
            webhook_secret: Arc::new(GetWebhookSecretHandler::new(
                deps.credentials,
                deps.fallback_webhook_secret,
            )),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Gateway Webhook
// ════════════════════════════════════════════════════════════════════════════════

/// First non-empty signature header, in lookup order.
fn signature_header(headers: &HeaderMap) -> Option<String> {
    SIGNATURE_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    })
}

/// POST /integrations/asaas/webhook - Reconcile a gateway payment event
pub async fn handle_asaas_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let delivery = WebhookDelivery {
        raw_body: body.to_vec(),
        signature: signature_header(&headers),
    };

    let outcome = state.webhook.handle(delivery).await;
    debug!(outcome = ?outcome, "Webhook delivery handled");

    (StatusCode::ACCEPTED, Json(WebhookAck::received()))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /billing/charges - Create a gateway charge for a financial flow
pub async fn create_charge(
    State(state): State<BillingAppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(request): Json<CreateChargeRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let remote_ip = client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    let cmd = CreateChargeCommand {
        financial_flow_id: request.financial_flow_id,
        billing_type: request.billing_type,
        value: request.value,
        due_date: request.due_date,
        description: request.description,
        customer_id: request.customer_id,
        credit_card_token: request.credit_card_token,
        integration_key_id: request.integration_key_id,
        remote_ip: remote_ip.map(|ip| ip.to_string()),
    };

    let result = state.create_charge.handle(cmd).await?;
    Ok((StatusCode::CREATED, Json(ChargeResponse::from(result))))
}

/// POST /billing/subscriptions - Put a company on a paid plan
pub async fn create_subscription(
    State(state): State<BillingAppState>,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let cmd = CreateSubscriptionCommand {
        company_id: request.company_id,
        plan_id: request.plan_id,
        value: request.value,
        billing_type: request.billing_type,
        cadence: request.cadence,
        with_trial: request.with_trial,
        description: request.description,
    };

    let result = state.create_subscription.handle(cmd).await?;
    Ok((StatusCode::CREATED, Json(SubscriptionResponse::from(result))))
}

/// POST /billing/subscriptions/cancel - Switch a company's plan off
pub async fn cancel_subscription(
    State(state): State<BillingAppState>,
    Json(request): Json<CancelSubscriptionRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let cmd = CancelSubscriptionCommand {
        company_id: request.company_id,
        external_reference: request.external_reference,
        subscription_id: request.subscription_id,
        customer_id: request.customer_id,
    };

    let result = state.cancel_subscription.handle(cmd).await?;
    Ok(Json(SubscriptionResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /billing/companies/:company_id/subscription - Derived subscription state
pub async fn get_subscription_status(
    State(state): State<BillingAppState>,
    Path(company_id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let company_id: CompanyId = company_id.parse()?;
    let view = state.subscription_status.handle(company_id).await?;
    Ok(Json(SubscriptionResponse::from(view)))
}

/// GET /billing/companies/:company_id/subscription/payments - Gateway payments
pub async fn list_subscription_payments(
    State(state): State<BillingAppState>,
    Path(company_id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let company_id: CompanyId = company_id.parse()?;
    let payments = state.subscription_payments.handle(company_id).await?;
    Ok(Json(SubscriptionPaymentsResponse {
        company_id,
        payments,
    }))
}

/// GET /credentials/:credential_id/webhook-secret - Webhook setup diagnostics
pub async fn get_webhook_secret(
    State(state): State<BillingAppState>,
    Path(credential_id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let credential_id: CredentialId = credential_id
        .trim()
        .parse()
        .map_err(|_| BillingError::validation("credentialId", "must be a UUID"))?;
    let view = state.webhook_secret.handle(credential_id).await?;
    Ok(Json(WebhookSecretResponse::from(view)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts billing errors to HTTP responses.
#[derive(Debug)]
pub struct BillingApiError(BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for BillingApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl BillingApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BillingError::Validation { .. } => StatusCode::BAD_REQUEST,
            BillingError::NotFound(_) => StatusCode::NOT_FOUND,
            BillingError::ChargeConflict { .. } => StatusCode::CONFLICT,
            BillingError::IntegrationNotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            BillingError::Gateway(e) => e
                .status
                .filter(|s| (400..500).contains(s))
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            BillingError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match &self.0 {
            BillingError::Infrastructure(detail) => {
                error!(error = %detail, "Billing request failed");
                "Internal server error".to_string()
            }
            BillingError::Gateway(e) => {
                error!(status = ?e.status, code = ?e.code, "Gateway request failed");
                e.message.clone()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse::new(self.0.code(), message);
        (status, Json(body)).into_response()
    }
}
