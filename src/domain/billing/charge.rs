//! Charges issued through the payment gateway.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    ChargeId, CredentialId, FinancialFlowId, Timestamp, ValidationError,
};

/// Payment method of a charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingType {
    Pix,
    Boleto,
    CreditCard,
    DebitCard,
}

impl BillingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingType::Pix => "PIX",
            BillingType::Boleto => "BOLETO",
            BillingType::CreditCard => "CREDIT_CARD",
            BillingType::DebitCard => "DEBIT_CARD",
        }
    }

    /// Card charges can only be created with a tokenized card.
    pub fn requires_card_token(&self) -> bool {
        matches!(self, BillingType::CreditCard | BillingType::DebitCard)
    }
}

impl fmt::Display for BillingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PIX" => Ok(BillingType::Pix),
            "BOLETO" => Ok(BillingType::Boleto),
            "CREDIT_CARD" => Ok(BillingType::CreditCard),
            "DEBIT_CARD" => Ok(BillingType::DebitCard),
            "" => Err(ValidationError::empty_field("billingType")),
            other => Err(ValidationError::invalid_format(
                "billingType",
                format!("unsupported billing type '{}'", other),
            )),
        }
    }
}

/// Status of a financial-flow ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStatus {
    Pendente,
    Pago,
    Estornado,
}

impl FlowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowStatus::Pendente => "pendente",
            FlowStatus::Pago => "pago",
            FlowStatus::Estornado => "estornado",
        }
    }

    /// Parses a stored column value, unknown values count as pending.
    pub fn from_column(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pago" => FlowStatus::Pago,
            "estornado" => FlowStatus::Estornado,
            _ => FlowStatus::Pendente,
        }
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway charge statuses that mean the money arrived.
pub const PAID_STATUSES: [&str; 3] = ["RECEIVED", "CONFIRMED", "RECEIVED_IN_CASH"];

/// Gateway charge statuses that mean the money went back.
pub const REVERSED_STATUSES: [&str; 5] = [
    "REFUNDED",
    "REFUND_IN_PROGRESS",
    "CHARGEBACK_REQUESTED",
    "CHARGEBACK_DISPUTE",
    "AWAITING_CHARGEBACK_REVERSAL",
];

/// Maps a gateway charge status onto the ledger status.
pub fn map_flow_status(gateway_status: &str) -> FlowStatus {
    let status = gateway_status.trim().to_ascii_uppercase();
    if PAID_STATUSES.contains(&status.as_str()) {
        FlowStatus::Pago
    } else if REVERSED_STATUSES.contains(&status.as_str()) {
        FlowStatus::Estornado
    } else {
        FlowStatus::Pendente
    }
}

/// Payment-method specific data returned when a charge is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentArtifacts {
    pub pix_payload: Option<String>,
    pub pix_qr_code: Option<String>,
    pub boleto_url: Option<String>,
    pub card_last4: Option<String>,
    pub card_brand: Option<String>,
}

impl PaymentArtifacts {
    /// PIX charges need both the copy-paste payload and the QR image.
    pub fn pix_incomplete(&self) -> bool {
        self.pix_payload.is_none() || self.pix_qr_code.is_none()
    }
}

/// Local record of a gateway charge. At most one exists per financial flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalCharge {
    pub id: ChargeId,
    pub financial_flow_id: FinancialFlowId,
    pub credential_id: Option<CredentialId>,
    pub gateway_charge_id: String,
    pub billing_type: BillingType,
    pub status: String,
    pub due_date: NaiveDate,
    pub value: f64,
    pub artifacts: PaymentArtifacts,
    pub last_event: Option<String>,
    pub raw_payload: Value,
    pub paid_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
