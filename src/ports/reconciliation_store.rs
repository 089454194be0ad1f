//! Reconciliation store port - applies one webhook event atomically.
//!
//! A webhook event may touch the charge row, its financial flow and the
//! company subscription. Implementations apply the whole plan in a single
//! transaction serialized per gateway charge id, so a failure leaves no
//! partial state behind.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::billing::{FlowStatus, TimelineChange};
use crate::domain::foundation::{CompanyId, DomainError, FinancialFlowId, Timestamp};

/// New state for the local charge row.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeStatusUpdate {
    pub status: String,
    pub last_event: String,
    pub raw_payload: Value,
    /// Kept as stored when `None`.
    pub paid_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowStatusUpdate {
    pub flow_id: FinancialFlowId,
    pub status: FlowStatus,
}

/// Timeline change to apply to a company, computed against the row as read
/// under lock.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyTimelineUpdate {
    pub company_id: CompanyId,
    pub change: TimelineChange,
}

/// Everything one event changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationPlan {
    pub gateway_charge_id: String,
    pub charge: Option<ChargeStatusUpdate>,
    pub flow: Option<FlowStatusUpdate>,
    pub company: Option<CompanyTimelineUpdate>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.charge.is_none() && self.flow.is_none() && self.company.is_none()
    }
}

/// Rows actually written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    pub charge_updated: bool,
    pub flow_updated: bool,
    pub company_updated: bool,
}

#[async_trait]
pub trait ReconciliationStore: Send + Sync {
    /// Applies `plan` all-or-nothing.
    async fn apply(&self, plan: &ReconciliationPlan) -> Result<AppliedChanges, DomainError>;
}
