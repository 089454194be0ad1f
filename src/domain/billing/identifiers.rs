//! Normalization of loosely-typed identifiers and amounts.
//!
//! Internal callers and gateway payloads send ids as numbers or strings and
//! amounts as numbers or numeric strings.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::domain::foundation::{CompanyId, FinancialFlowId, ValidationError};

static COMPANY_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)empresa[-_]?(\d+)").expect("valid company reference pattern"));

/// Metadata keys that may carry the company id, in lookup order.
pub const COMPANY_METADATA_KEYS: &[&str] = &[
    "empresaId",
    "empresa_id",
    "companyId",
    "company_id",
    "empresa",
    "company",
];

/// Normalizes a financial-flow id given as a JSON number or string.
pub fn normalize_flow_id(raw: &Value) -> Result<FinancialFlowId, ValidationError> {
    match raw {
        Value::Number(n) => match n.as_i64() {
            Some(id) if id > 0 => Ok(FinancialFlowId::Numeric(id)),
            _ => Err(ValidationError::invalid_format(
                "financialFlowId",
                "must be a positive integer or a UUID",
            )),
        },
        Value::String(s) => s.parse(),
        Value::Null => Err(ValidationError::empty_field("financialFlowId")),
        _ => Err(ValidationError::invalid_format(
            "financialFlowId",
            "must be a positive integer or a UUID",
        )),
    }
}

/// Normalizes a charge amount: finite and strictly positive.
pub fn normalize_amount(raw: &Value) -> Result<f64, ValidationError> {
    let amount = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        Value::Null => return Err(ValidationError::empty_field("value")),
        _ => None,
    };

    match amount {
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(ValidationError::invalid_format(
            "value",
            "must be a finite positive number",
        )),
    }
}

/// Parses a company id out of an external reference such as `empresa-42`.
pub fn parse_company_reference(reference: &str) -> Option<CompanyId> {
    let captures = COMPANY_REFERENCE.captures(reference)?;
    let id: i64 = captures.get(1)?.as_str().parse().ok()?;
    CompanyId::new(id).ok()
}

/// Reads the company id from a payment's metadata object.
pub fn company_id_from_metadata(metadata: &Value) -> Option<CompanyId> {
    let object = metadata.as_object()?;
    COMPANY_METADATA_KEYS
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(value_as_company_id)
}

/// Interprets a JSON scalar as a company id.
pub fn value_as_company_id(value: &Value) -> Option<CompanyId> {
    match value {
        Value::Number(n) => CompanyId::new(n.as_i64()?).ok(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
