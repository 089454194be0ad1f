//! Charge repository port.
//!
//! Local charges and the financial-flow rows they settle. A flow has at most
//! one charge; implementations enforce this with a unique constraint and
//! report a lost race as `SaveResult::AlreadyExists`.

use async_trait::async_trait;

use crate::domain::billing::{FinancialFlow, FlowStatus, LocalCharge};
use crate::domain::foundation::{DomainError, FinancialFlowId};

/// Outcome of an insert guarded by a unique constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// The row was written.
    Inserted,
    /// A row with the same key already existed; nothing was written.
    AlreadyExists,
}

#[async_trait]
pub trait ChargeRepository: Send + Sync {
    /// Loads a financial flow with its company and client context.
    async fn find_flow(&self, id: &FinancialFlowId) -> Result<Option<FinancialFlow>, DomainError>;

    /// Finds the flow whose `external_reference_id` equals `reference`.
    async fn find_flow_by_external_reference(
        &self,
        reference: &str,
    ) -> Result<Option<FinancialFlow>, DomainError>;

    /// Local charge attached to a flow, if any.
    async fn find_by_flow_id(&self, id: &FinancialFlowId)
        -> Result<Option<LocalCharge>, DomainError>;

    /// Local charge for a gateway charge id, if any.
    async fn find_by_gateway_id(&self, gateway_charge_id: &str)
        -> Result<Option<LocalCharge>, DomainError>;

    /// Inserts `charge` and sets its flow to `flow_status` atomically.
    ///
    /// When the flow already has a charge nothing is written and
    /// `SaveResult::AlreadyExists` is returned.
    async fn insert_with_flow_status(
        &self,
        charge: &LocalCharge,
        flow_status: FlowStatus,
    ) -> Result<SaveResult, DomainError>;
}
