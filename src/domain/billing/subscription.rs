//! Company subscription snapshot and state derivation.
//!
//! The subscription has no stored status column. The state is always
//! recomputed from the five timeline timestamps and an explicit `now`, so a
//! trial or grace period expires without any event being processed. Callers
//! must not cache a resolved state across writes.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::cadence::Cadence;
use super::timeline::{billing_period, grace_deadline, trial_end};
use crate::domain::foundation::{CompanyId, Timestamp};

/// Derived subscription state of a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    /// No plan, or the plan was switched off.
    Inactive,
    /// Provisioned but no trial and no confirmed payment yet.
    Pending,
    /// Inside the free trial window.
    Trialing,
    /// Inside a paid billing period.
    Active,
    /// Period elapsed, still inside the tolerance window.
    GracePeriod,
    /// Every window has elapsed.
    PastDue,
}

impl SubscriptionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::Inactive => "inactive",
            SubscriptionState::Pending => "pending",
            SubscriptionState::Trialing => "trialing",
            SubscriptionState::Active => "active",
            SubscriptionState::GracePeriod => "grace_period",
            SubscriptionState::PastDue => "past_due",
        }
    }

    /// Whether the company may use the product in this state.
    pub fn grants_access(&self) -> bool {
        matches!(
            self,
            SubscriptionState::Trialing | SubscriptionState::Active | SubscriptionState::GracePeriod
        )
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription columns of one company row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanySubscription {
    pub company_id: CompanyId,
    pub plan_id: Option<i64>,
    pub active: bool,
    pub cadence: Cadence,
    pub trial_started_at: Option<Timestamp>,
    pub trial_ends_at: Option<Timestamp>,
    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub grace_expires_at: Option<Timestamp>,
    pub gateway_subscription_id: Option<String>,
    pub gateway_customer_id: Option<String>,
}

/// A change to the subscription timeline caused by a gateway event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineChange {
    /// A payment was confirmed; roll a new period forward from `paid_at`.
    PaymentConfirmed { paid_at: Timestamp },
    /// A payment went overdue; extend the grace deadline.
    PaymentOverdue { observed_at: Timestamp },
}

impl CompanySubscription {
    /// Empty snapshot for a company that was never provisioned.
    pub fn unprovisioned(company_id: CompanyId) -> Self {
        Self {
            company_id,
            plan_id: None,
            active: false,
            cadence: Cadence::Monthly,
            trial_started_at: None,
            trial_ends_at: None,
            current_period_start: None,
            current_period_end: None,
            grace_expires_at: None,
            gateway_subscription_id: None,
            gateway_customer_id: None,
        }
    }

    /// Derives the state at `now`. First matching rule wins.
    pub fn resolve_state(&self, now: Timestamp) -> SubscriptionState {
        if self.plan_id.is_none() || !self.active {
            return SubscriptionState::Inactive;
        }

        if let (Some(_), Some(end)) = (self.trial_started_at, self.trial_ends_at) {
            if now.is_before(&end) {
                return SubscriptionState::Trialing;
            }
        }

        if let (Some(_), Some(end)) = (self.current_period_start, self.current_period_end) {
            if !now.is_after(&end) {
                return SubscriptionState::Active;
            }
        }

        if let Some(grace) = self.grace_expires_at {
            if !now.is_after(&grace) {
                return SubscriptionState::GracePeriod;
            }
        }

        if !self.has_any_timeline() {
            return SubscriptionState::Pending;
        }

        SubscriptionState::PastDue
    }

    fn has_any_timeline(&self) -> bool {
        self.trial_started_at.is_some()
            || self.trial_ends_at.is_some()
            || self.current_period_start.is_some()
            || self.current_period_end.is_some()
            || self.grace_expires_at.is_some()
    }

    /// Applies a timeline change in place.
    pub fn apply(&mut self, change: TimelineChange) {
        match change {
            TimelineChange::PaymentConfirmed { paid_at } => self.record_payment(paid_at),
            TimelineChange::PaymentOverdue { observed_at } => self.record_overdue(observed_at),
        }
    }

    /// Starts a new paid period at `paid_at` and ends any trial.
    pub fn record_payment(&mut self, paid_at: Timestamp) {
        let period = billing_period(paid_at, self.cadence);
        self.current_period_start = Some(period.start);
        self.current_period_end = Some(period.end);
        self.grace_expires_at = Some(grace_deadline(period.end, self.cadence));
        self.trial_started_at = None;
        self.trial_ends_at = None;
        self.active = true;
    }

    /// Moves the grace deadline to one grace window after the current period
    /// end, or after `observed_at` when no period was ever paid.
    pub fn record_overdue(&mut self, observed_at: Timestamp) {
        let anchor = self.current_period_end.unwrap_or(observed_at);
        self.grace_expires_at = Some(grace_deadline(anchor, self.cadence));
    }

    /// Provisions a plan. Grants a trial starting at `now` when requested and
    /// no paid period exists; an existing paid period is kept.
    pub fn provision(&mut self, plan_id: i64, cadence: Cadence, with_trial: bool, now: Timestamp) {
        self.plan_id = Some(plan_id);
        self.cadence = cadence;
        self.active = true;

        if with_trial && self.current_period_end.is_none() {
            self.trial_started_at = Some(now);
            self.trial_ends_at = Some(trial_end(now));
        }
    }

    /// Switches the plan off. The row is kept, its timeline is cleared.
    pub fn cancel(&mut self) {
        self.active = false;
        self.trial_started_at = None;
        self.trial_ends_at = None;
        self.current_period_start = None;
        self.current_period_end = None;
        self.grace_expires_at = None;
        self.gateway_subscription_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn ts(y: i32, m: u32, d: u32) -> Timestamp {
        Timestamp::from_datetime(Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap())
    }

    fn provisioned() -> CompanySubscription {
        let mut sub = CompanySubscription::unprovisioned(CompanyId::new(1).unwrap());
        sub.plan_id = Some(3);
        sub.active = true;
        sub
    }

    // ══════════════════════════════════════════════════════════════
    // State Resolution
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn no_plan_is_inactive() {
        let mut sub = provisioned();
        sub.plan_id = None;
        assert_eq!(sub.resolve_state(ts(2026, 1, 1)), SubscriptionState::Inactive);
    }

    #[test]
    fn inactive_flag_wins_over_valid_period() {
        let mut sub = provisioned();
        sub.record_payment(ts(2026, 1, 1));
        sub.active = false;
        assert_eq!(sub.resolve_state(ts(2026, 1, 2)), SubscriptionState::Inactive);
    }

    #[test]
    fn freshly_provisioned_without_trial_is_pending() {
        let sub = provisioned();
        assert_eq!(sub.resolve_state(ts(2026, 1, 1)), SubscriptionState::Pending);
    }

    #[test]
    fn trial_window_is_trialing_until_exclusive_end() {
        let mut sub = provisioned();
        sub.provision(3, Cadence::Monthly, true, ts(2026, 1, 1));
        assert_eq!(sub.resolve_state(ts(2026, 1, 14)), SubscriptionState::Trialing);
        // now == trial end is no longer trialing; nothing else set so past due
        assert_eq!(sub.resolve_state(ts(2026, 1, 15)), SubscriptionState::PastDue);
    }

    #[test]
    fn period_end_is_inclusive() {
        let mut sub = provisioned();
        sub.record_payment(ts(2026, 1, 1));
        assert_eq!(sub.resolve_state(ts(2026, 1, 31)), SubscriptionState::Active);
    }

    #[test]
    fn grace_then_past_due() {
        let mut sub = provisioned();
        sub.record_payment(ts(2026, 1, 1));
        assert_eq!(sub.resolve_state(ts(2026, 2, 5)), SubscriptionState::GracePeriod);
        assert_eq!(sub.resolve_state(ts(2026, 2, 7)), SubscriptionState::GracePeriod);
        assert_eq!(sub.resolve_state(ts(2026, 2, 8)), SubscriptionState::PastDue);
    }

    #[test]
    fn trial_beats_simultaneous_period() {
        let mut sub = provisioned();
        sub.trial_started_at = Some(ts(2026, 1, 1));
        sub.trial_ends_at = Some(ts(2026, 1, 15));
        sub.current_period_start = Some(ts(2026, 1, 1));
        sub.current_period_end = Some(ts(2026, 1, 31));
        assert_eq!(sub.resolve_state(ts(2026, 1, 5)), SubscriptionState::Trialing);
    }

    // ══════════════════════════════════════════════════════════════
    // Timeline Changes
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn payment_rolls_period_and_clears_trial() {
        let mut sub = provisioned();
        sub.provision(3, Cadence::Monthly, true, ts(2026, 1, 1));
        sub.active = false;

        sub.apply(TimelineChange::PaymentConfirmed { paid_at: ts(2026, 1, 10) });

        assert!(sub.active);
        assert_eq!(sub.current_period_start, Some(ts(2026, 1, 10)));
        assert_eq!(sub.current_period_end, Some(ts(2026, 2, 9)));
        assert_eq!(sub.grace_expires_at, Some(ts(2026, 2, 16)));
        assert!(sub.trial_started_at.is_none());
        assert!(sub.trial_ends_at.is_none());
    }

    #[test]
    fn annual_payment_uses_annual_lengths() {
        let mut sub = provisioned();
        sub.cadence = Cadence::Annual;
        sub.record_payment(ts(2026, 1, 1));
        assert_eq!(sub.current_period_end, Some(ts(2027, 1, 1)));
        assert_eq!(sub.grace_expires_at, Some(ts(2027, 1, 31)));
    }

    #[test]
    fn overdue_extends_grace_from_period_end() {
        let mut sub = provisioned();
        sub.record_payment(ts(2026, 1, 1));
        sub.grace_expires_at = None;

        sub.apply(TimelineChange::PaymentOverdue { observed_at: ts(2026, 3, 1) });

        assert_eq!(sub.grace_expires_at, Some(ts(2026, 2, 7)));
    }

    #[test]
    fn overdue_without_period_uses_observed_time() {
        let mut sub = provisioned();
        sub.record_overdue(ts(2026, 3, 1));
        assert_eq!(sub.grace_expires_at, Some(ts(2026, 3, 8)));
        assert_eq!(sub.resolve_state(ts(2026, 3, 5)), SubscriptionState::GracePeriod);
    }

    #[test]
    fn provision_keeps_paid_period_and_skips_trial() {
        let mut sub = provisioned();
        sub.record_payment(ts(2026, 1, 1));
        sub.provision(4, Cadence::Annual, true, ts(2026, 1, 5));

        assert_eq!(sub.plan_id, Some(4));
        assert_eq!(sub.cadence, Cadence::Annual);
        assert!(sub.trial_ends_at.is_none());
        assert_eq!(sub.current_period_start, Some(ts(2026, 1, 1)));
    }

    #[test]
    fn cancel_nulls_timeline_and_subscription() {
        let mut sub = provisioned();
        sub.record_payment(ts(2026, 1, 1));
        sub.gateway_subscription_id = Some("sub_1".to_string());
        sub.gateway_customer_id = Some("cus_1".to_string());

        sub.cancel();

        assert_eq!(sub.resolve_state(ts(2026, 1, 2)), SubscriptionState::Inactive);
        assert!(sub.current_period_end.is_none());
        assert!(sub.grace_expires_at.is_none());
        assert!(sub.gateway_subscription_id.is_none());
        assert_eq!(sub.gateway_customer_id.as_deref(), Some("cus_1"));
        assert_eq!(sub.plan_id, Some(3));
    }

    proptest! {
        #[test]
        fn trial_always_wins_before_trial_end(
            before in 1i64..1_000_000,
            period_offset in -5_000_000i64..5_000_000,
            grace_offset in -5_000_000i64..5_000_000,
        ) {
            let trial_start = ts(2026, 1, 1);
            let end = trial_end(trial_start);
            let now = Timestamp::from_datetime(*end.as_datetime() - chrono::Duration::seconds(before));

            let mut sub = provisioned();
            sub.trial_started_at = Some(trial_start);
            sub.trial_ends_at = Some(end);
            let anchor = *end.as_datetime() + chrono::Duration::seconds(period_offset);
            sub.current_period_start = Some(Timestamp::from_datetime(anchor));
            sub.current_period_end = Some(Timestamp::from_datetime(anchor).add_days(30));
            sub.grace_expires_at = Some(Timestamp::from_datetime(
                *end.as_datetime() + chrono::Duration::seconds(grace_offset),
            ));

            prop_assert_eq!(sub.resolve_state(now), SubscriptionState::Trialing);
        }
    }
}
