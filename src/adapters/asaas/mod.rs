//! Asaas payment gateway adapter.
//!
//! - `AsaasClient` - reqwest implementation of `PaymentGateway`
//! - `AsaasClientFactory` - one client per resolved credential
//! - `MockPaymentGateway` - in-memory gateway for tests

mod client;
mod mock_gateway;
mod types;

pub use client::{AsaasClient, AsaasClientFactory};
pub use mock_gateway::{MethodCall, MockGatewayFactory, MockPaymentGateway};
