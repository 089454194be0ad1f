//! Read model of a financial-flow ledger entry.
//!
//! The ledger is owned by the accounting side of the product; billing only
//! reads these columns and writes the status and external reference.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::charge::FlowStatus;
use crate::domain::foundation::{ClienteId, CompanyId, FinancialFlowId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialFlow {
    pub id: FinancialFlowId,
    pub company_id: Option<CompanyId>,
    pub cliente_id: Option<ClienteId>,
    /// Gateway customer registered for the flow's client, if any.
    pub gateway_customer_id: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub value: Option<f64>,
    pub status: FlowStatus,
    pub external_provider: Option<String>,
    pub external_reference_id: Option<String>,
}
