//! Billing domain - charges, subscription timelines and gateway webhooks.
//!
//! Everything in here is pure: no I/O, and every time-dependent function
//! takes `now` explicitly.

mod cadence;
mod charge;
mod company;
mod credential;
mod errors;
pub mod extract;
mod flow;
pub mod identifiers;
pub mod timeline;
mod subscription;
mod webhook_event;
mod webhook_verifier;

pub use cadence::Cadence;
pub use charge::{
    map_flow_status, BillingType, FlowStatus, LocalCharge, PaymentArtifacts, PAID_STATUSES,
    REVERSED_STATUSES,
};
pub use company::CompanyProfile;
pub use credential::{
    normalize_base_url, GatewayCredential, GatewayEnvironment, ResolvedCredential, ScopeFilter,
    PROVIDER,
};
pub use errors::{BillingError, GatewayApiError};
pub use flow::FinancialFlow;
pub use subscription::{CompanySubscription, SubscriptionState, TimelineChange};
pub use timeline::{billing_period, grace_deadline, trial_end, BillingPeriod, TRIAL_DAYS};
pub use webhook_event::{
    EventEffect, GatewayEvent, PaymentPayload, WebhookDelivery, WebhookEnvelope,
};
pub use webhook_verifier::{
    compute_signature, SignatureError, WebhookSignatureVerifier, SIGNATURE_HEADERS,
};
