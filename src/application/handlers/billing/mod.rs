//! Billing handlers.
//!
//! Command and query handlers of the billing reconciliation engine:
//!
//! ## Commands
//! - Creating gateway charges for financial flows
//! - Reconciling gateway payment webhooks
//! - Provisioning and cancelling platform subscriptions
//!
//! ## Queries
//! - Subscription state of a company
//! - Payments of a company's gateway subscription
//! - Webhook setup of a credential (diagnostic)
//!
//! ## Shared services
//! - `CredentialResolver` picks the gateway account to talk to
//! - `CompanyResolutionChain` maps gateway payloads to a company

mod cancel_subscription;
mod company_resolution;
mod create_charge;
mod create_subscription;
mod credential_resolver;
mod get_subscription_status;
mod get_webhook_secret;
mod handle_gateway_webhook;
mod list_subscription_payments;

// Shared services
pub use company_resolution::{ChargeContext, CompanyHints, CompanyResolutionChain};
pub use credential_resolver::{CredentialPolicy, CredentialResolver};

// Commands
pub use cancel_subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
};
pub use create_charge::{CreateChargeCommand, CreateChargeHandler, CreateChargeResult};
pub use create_subscription::{
    company_reference, CreateSubscriptionCommand, CreateSubscriptionHandler,
    CreateSubscriptionResult,
};
pub use handle_gateway_webhook::{HandleGatewayWebhookHandler, WebhookOutcome};

// Queries
pub use get_subscription_status::{GetSubscriptionStatusHandler, SubscriptionStatusView};
pub use get_webhook_secret::{
    GetWebhookSecretHandler, WebhookSecretSource, WebhookSecretView, WEBHOOK_PATH,
};
pub use list_subscription_payments::ListSubscriptionPaymentsHandler;
