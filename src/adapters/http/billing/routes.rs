//! Axum router configuration for billing endpoints.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::handlers::{
    cancel_subscription, create_charge, create_subscription, get_subscription_status,
    get_webhook_secret, handle_asaas_webhook, list_subscription_payments, BillingAppState,
};
use crate::adapters::http::middleware::{ip_allowlist_middleware, IpAllowlistState};
use crate::application::handlers::billing::WEBHOOK_PATH;

/// Internal billing API.
///
/// # Routes
/// - `POST /charges` - Create a gateway charge for a financial flow
/// - `POST /subscriptions` - Put a company on a paid plan
/// - `POST /subscriptions/cancel` - Switch a company's plan off
/// - `GET /companies/:company_id/subscription` - Derived subscription state
/// - `GET /companies/:company_id/subscription/payments` - Gateway plan payments
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/charges", post(create_charge))
        .route("/subscriptions", post(create_subscription))
        .route("/subscriptions/cancel", post(cancel_subscription))
        .route("/companies/:company_id/subscription", get(get_subscription_status))
        .route(
            "/companies/:company_id/subscription/payments",
            get(list_subscription_payments),
        )
}

/// Credential diagnostics.
///
/// # Routes
/// - `GET /:credential_id/webhook-secret` - Webhook secret and setup instructions
pub fn credential_routes() -> Router<BillingAppState> {
    Router::new().route("/:credential_id/webhook-secret", get(get_webhook_secret))
}

/// Gateway callback. Kept apart from the internal API because it is
/// authenticated by signature and filtered by source address instead.
pub fn webhook_routes(allowlist: IpAllowlistState) -> Router<BillingAppState> {
    Router::new()
        .route(WEBHOOK_PATH, post(handle_asaas_webhook))
        .route_layer(middleware::from_fn_with_state(
            allowlist,
            ip_allowlist_middleware,
        ))
}

/// The complete billing router, ready for `with_state`.
///
/// # Example
///
/// ```ignore
/// let app = billing_router(allowlist).with_state(BillingAppState::new(deps));
/// ```
pub fn billing_router(allowlist: IpAllowlistState) -> Router<BillingAppState> {
    Router::new()
        .nest("/billing", billing_routes())
        .nest("/credentials", credential_routes())
        .merge(webhook_routes(allowlist))
}
