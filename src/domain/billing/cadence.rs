//! Billing cadence of a company subscription.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// How often a company is billed for its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    #[default]
    Monthly,
    Annual,
}

impl Cadence {
    /// Length of one paid billing period in absolute days.
    pub fn period_days(&self) -> i64 {
        match self {
            Cadence::Monthly => 30,
            Cadence::Annual => 365,
        }
    }

    /// Days of tolerance after a period ends before the company is past due.
    pub fn grace_days(&self) -> i64 {
        match self {
            Cadence::Monthly => 7,
            Cadence::Annual => 30,
        }
    }

    /// Cycle name the payment gateway uses for recurring subscriptions.
    pub fn gateway_cycle(&self) -> &'static str {
        match self {
            Cadence::Monthly => "MONTHLY",
            Cadence::Annual => "YEARLY",
        }
    }

    /// Stored column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Monthly => "monthly",
            Cadence::Annual => "annual",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cadence {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "mensal" => Ok(Cadence::Monthly),
            "annual" | "anual" | "yearly" => Ok(Cadence::Annual),
            other => Err(ValidationError::invalid_format(
                "cadence",
                format!("unknown cadence '{}'", other),
            )),
        }
    }
}
