//! HTTP adapter for billing endpoints.
//!
//! - `POST /integrations/asaas/webhook` - Gateway payment webhook (always 202)
//! - `POST /billing/charges` - Create a charge for a financial flow
//! - `POST /billing/subscriptions` - Create or update a company's plan subscription
//! - `POST /billing/subscriptions/cancel` - Cancel a company's plan
//! - `GET /billing/companies/:company_id/subscription` - Subscription state
//! - `GET /billing/companies/:company_id/subscription/payments` - Plan payments
//! - `GET /credentials/:credential_id/webhook-secret` - Webhook setup diagnostics

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{BillingApiError, BillingAppState, BillingDependencies};
pub use routes::{billing_router, billing_routes, credential_routes, webhook_routes};
