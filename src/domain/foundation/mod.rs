//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, the UTC timestamp value object and error types
//! that form the vocabulary of the billing engine.

mod errors;
mod ids;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{ChargeId, ClienteId, CompanyId, CredentialId, FinancialFlowId};
pub use timestamp::Timestamp;
