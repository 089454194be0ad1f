//! Inbound gateway webhook deliveries.
//!
//! Only the fields needed for reconciliation are interpreted; the payment
//! object is kept as raw JSON so it can be stored verbatim on the charge.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::charge::{map_flow_status, FlowStatus};
use super::extract::{first_string, lookup};
use crate::domain::foundation::Timestamp;

/// Payment events the engine acts on. Everything else is acknowledged and
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayEvent {
    PaymentReceived,
    PaymentConfirmed,
    PaymentOverdue,
    PaymentRefunded,
}

impl GatewayEvent {
    /// Parses an event name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "PAYMENT_RECEIVED" => Some(GatewayEvent::PaymentReceived),
            "PAYMENT_CONFIRMED" => Some(GatewayEvent::PaymentConfirmed),
            "PAYMENT_OVERDUE" => Some(GatewayEvent::PaymentOverdue),
            "PAYMENT_REFUNDED" => Some(GatewayEvent::PaymentRefunded),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayEvent::PaymentReceived => "PAYMENT_RECEIVED",
            GatewayEvent::PaymentConfirmed => "PAYMENT_CONFIRMED",
            GatewayEvent::PaymentOverdue => "PAYMENT_OVERDUE",
            GatewayEvent::PaymentRefunded => "PAYMENT_REFUNDED",
        }
    }

    /// Charge status implied by the event when the payload carries none.
    pub fn implied_status(&self) -> &'static str {
        match self {
            GatewayEvent::PaymentReceived => "RECEIVED",
            GatewayEvent::PaymentConfirmed => "CONFIRMED",
            GatewayEvent::PaymentOverdue => "OVERDUE",
            GatewayEvent::PaymentRefunded => "REFUNDED",
        }
    }
}

impl fmt::Display for GatewayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an event does to the ledger and the subscription timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventEffect {
    /// Flow becomes `pago`, timeline rolls forward.
    Paid,
    /// Flow becomes `estornado`, timeline untouched.
    Reversed,
    /// Grace deadline is extended.
    Overdue,
    /// Only the charge row is updated.
    None,
}

impl EventEffect {
    /// The gateway-reported status decides; the event name only matters when
    /// the status is neither paid nor reversed.
    pub fn classify(event: GatewayEvent, status: &str) -> Self {
        match map_flow_status(status) {
            FlowStatus::Pago => EventEffect::Paid,
            FlowStatus::Estornado => EventEffect::Reversed,
            FlowStatus::Pendente if event == GatewayEvent::PaymentOverdue => EventEffect::Overdue,
            FlowStatus::Pendente => EventEffect::None,
        }
    }

    /// Ledger status to write, if the effect touches the ledger.
    pub fn flow_status(&self) -> Option<FlowStatus> {
        match self {
            EventEffect::Paid => Some(FlowStatus::Pago),
            EventEffect::Reversed => Some(FlowStatus::Estornado),
            EventEffect::Overdue | EventEffect::None => None,
        }
    }
}

/// JSON body of a webhook delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub payment: Value,
}

impl WebhookEnvelope {
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    pub fn gateway_event(&self) -> Option<GatewayEvent> {
        GatewayEvent::parse(&self.event)
    }

    pub fn payment(&self) -> PaymentPayload<'_> {
        PaymentPayload(&self.payment)
    }
}

const PAYMENT_DATE_FIELDS: &[&str] = &[
    "paymentDate",
    "clientPaymentDate",
    "confirmedDate",
    "creditDate",
    "updatedDate",
];

/// Read-only view over the `payment` object of a delivery.
#[derive(Debug, Clone, Copy)]
pub struct PaymentPayload<'a>(pub &'a Value);

impl<'a> PaymentPayload<'a> {
    /// Gateway charge id (`id`, then `chargeId`).
    pub fn charge_id(&self) -> Option<String> {
        first_string(self.0, &["id", "chargeId"])
    }

    pub fn status(&self) -> Option<String> {
        first_string(self.0, &["status"]).map(|s| s.to_ascii_uppercase())
    }

    /// Reported status, or the one implied by the event name.
    pub fn effective_status(&self, event: GatewayEvent) -> String {
        self.status()
            .unwrap_or_else(|| event.implied_status().to_string())
    }

    /// First parseable payment date among the known fields.
    pub fn payment_date(&self) -> Option<Timestamp> {
        PAYMENT_DATE_FIELDS.iter().find_map(|field| {
            first_string(self.0, &[*field]).and_then(|raw| Timestamp::parse_flexible(&raw))
        })
    }

    pub fn external_reference(&self) -> Option<String> {
        first_string(self.0, &["externalReference"])
    }

    pub fn subscription(&self) -> Option<String> {
        first_string(self.0, &["subscription"])
    }

    pub fn customer(&self) -> Option<String> {
        first_string(self.0, &["customer"])
    }

    pub fn metadata(&self) -> Option<&'a Value> {
        lookup(self.0, "metadata").filter(|v| v.is_object())
    }
}

/// An authenticated-or-not delivery as received: raw bytes plus header.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    pub raw_body: Vec<u8>,
    pub signature: Option<String>,
}
