//! Billing error taxonomy.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, FinancialFlowId, ValidationError};

/// Error returned by the gateway API, or by the transport in front of it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Gateway error ({}): {message}", status_label(.status))]
pub struct GatewayApiError {
    /// Upstream HTTP status, `None` when no response arrived.
    pub status: Option<u16>,
    /// First error code in the response body, if parseable.
    pub code: Option<String>,
    pub message: String,
    /// Raw response body.
    pub body: Option<String>,
}

impl GatewayApiError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
            body: None,
        }
    }

    /// Whether the gateway rejected the request itself (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self.status, Some(400..=499))
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

fn status_label(status: &Option<u16>) -> String {
    status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "transport".to_string())
}

/// Errors surfaced by billing operations to internal callers.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("A charge already exists for financial flow {financial_flow_id}")]
    ChargeConflict { financial_flow_id: String },

    #[error("Payment integration not configured: {0}")]
    IntegrationNotConfigured(String),

    #[error(transparent)]
    Gateway(#[from] GatewayApiError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl BillingError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn conflict(flow: &FinancialFlowId) -> Self {
        BillingError::ChargeConflict {
            financial_flow_id: flow.to_string(),
        }
    }

    /// Stable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::Validation { .. } => "VALIDATION_FAILED",
            BillingError::ChargeConflict { .. } => "CHARGE_CONFLICT",
            BillingError::IntegrationNotConfigured(_) => "INTEGRATION_NOT_CONFIGURED",
            BillingError::Gateway(_) => "GATEWAY_ERROR",
            BillingError::NotFound(_) => "NOT_FOUND",
            BillingError::Infrastructure(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        BillingError::Validation {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ChargeConflict => BillingError::ChargeConflict {
                financial_flow_id: err
                    .details
                    .get("financial_flow_id")
                    .cloned()
                    .unwrap_or_default(),
            },
            ErrorCode::ValidationFailed => BillingError::Validation {
                field: err.details.get("field").cloned().unwrap_or_default(),
                message: err.message,
            },
            ErrorCode::CompanyNotFound
            | ErrorCode::FinancialFlowNotFound
            | ErrorCode::CredentialNotFound => BillingError::NotFound(err.message),
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                BillingError::Infrastructure(err.message)
            }
        }
    }
}
