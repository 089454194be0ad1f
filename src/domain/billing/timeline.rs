//! Subscription timeline arithmetic.
//!
//! Pure functions, no I/O. Everything is computed in absolute days on UTC
//! instants.

use serde::{Deserialize, Serialize};

use super::cadence::Cadence;
use crate::domain::foundation::Timestamp;

/// Length of the free trial granted on provisioning.
pub const TRIAL_DAYS: i64 = 14;

/// A paid billing window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub start: Timestamp,
    pub end: Timestamp,
}

/// End of a trial that starts at `start`.
pub fn trial_end(start: Timestamp) -> Timestamp {
    start.add_days(TRIAL_DAYS)
}

/// Billing window that starts at `start` for the given cadence.
pub fn billing_period(start: Timestamp, cadence: Cadence) -> BillingPeriod {
    BillingPeriod {
        start,
        end: start.add_days(cadence.period_days()),
    }
}

/// Last instant a company keeps access after `period_end` without paying.
pub fn grace_deadline(period_end: Timestamp, cadence: Cadence) -> Timestamp {
    period_end.add_days(cadence.grace_days())
}
