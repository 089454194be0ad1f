//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// Identifier of a tenant company (`empresas.id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(i64);

impl CompanyId {
    /// Creates a CompanyId, rejecting non-positive values.
    pub fn new(id: i64) -> Result<Self, ValidationError> {
        if id <= 0 {
            return Err(ValidationError::invalid_format(
                "company_id",
                "must be a positive integer",
            ));
        }
        Ok(Self(id))
    }

    /// Returns the raw database id.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CompanyId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: i64 = s
            .trim()
            .parse()
            .map_err(|_| ValidationError::invalid_format("company_id", "not an integer"))?;
        Self::new(id)
    }
}

/// Identifier of a client of a company (`clientes.id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClienteId(i64);

impl ClienteId {
    pub fn from_i64(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ClienteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a stored gateway credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(Uuid);

impl CredentialId {
    /// Creates a new random CredentialId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a CredentialId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CredentialId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CredentialId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identifier of a local charge record (`asaas_charges.id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChargeId(Uuid);

impl ChargeId {
    /// Creates a new random ChargeId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a ChargeId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ChargeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChargeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a financial-flow ledger entry.
///
/// Ledger rows are keyed by integers in older installations and by UUIDs in
/// newer ones, so both shapes are accepted. Anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FinancialFlowId {
    Numeric(i64),
    Uuid(Uuid),
}

impl FinancialFlowId {
    /// Canonical text form used for `id::text = $1` comparisons.
    pub fn as_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FinancialFlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinancialFlowId::Numeric(id) => write!(f, "{}", id),
            FinancialFlowId::Uuid(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for FinancialFlowId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("financialFlowId"));
        }
        if let Ok(id) = trimmed.parse::<i64>() {
            if id > 0 {
                return Ok(FinancialFlowId::Numeric(id));
            }
            return Err(ValidationError::invalid_format(
                "financialFlowId",
                "must be a positive integer or a UUID",
            ));
        }
        Uuid::parse_str(trimmed)
            .map(FinancialFlowId::Uuid)
            .map_err(|_| {
                ValidationError::invalid_format(
                    "financialFlowId",
                    "must be a positive integer or a UUID",
                )
            })
    }
}
