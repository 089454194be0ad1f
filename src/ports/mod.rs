//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the billing domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `CredentialStore` - Gateway credentials (read-only)
//! - `ChargeRepository` - Local charges and their financial flows
//! - `CompanyDirectory` - Company lookups and subscription columns
//! - `ReconciliationStore` - Atomic application of one webhook event
//!
//! ## Gateway Ports
//!
//! - `PaymentGateway` - Outbound gateway API bound to one credential
//! - `GatewayClientFactory` - Builds a `PaymentGateway` per credential

mod charge_repository;
mod company_directory;
mod credential_store;
mod payment_gateway;
mod reconciliation_store;

pub use charge_repository::{ChargeRepository, SaveResult};
pub use company_directory::CompanyDirectory;
pub use credential_store::CredentialStore;
pub use payment_gateway::{
    CreateChargeRequest, CustomerRequest, GatewayCharge, GatewayClientFactory, GatewayCustomer,
    GatewaySubscription, PaymentGateway, SubscriptionPayment, SubscriptionRequest,
};
pub use reconciliation_store::{
    AppliedChanges, ChargeStatusUpdate, CompanyTimelineUpdate, FlowStatusUpdate,
    ReconciliationPlan, ReconciliationStore,
};
