//! Plan upgrades triggered by confirmed payments.
//!
//! An upgrade always starts a fresh cycle on the new plan. Unused trial days are not lost: they
//! are carried into the new cycle as bonus days.
//!
//! ```text
//! trial, 3 days left ──apply(monthly)──► active, 30 + 3 = 33 days, counters reset
//! expired            ──apply(monthly)──► active, 30 days
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::{
    entitlement::evaluate,
    state::{SubscriptionState, SubscriptionStatus},
};
use crate::{
    account::AccountId,
    catalog::{PlanCatalog, PlanId},
    error::{EntitlementError, Result},
};

/// Maximum length of a payment reference.
const MAX_PAYMENT_REF_LEN: usize = 128;

/// Verified fact that an account paid for a plan.
///
/// Emitted by the payment collaborator once the gateway confirmed the charge. The engine does
/// not verify payments itself; holding a `PaymentConfirmation` is what authorizes an upgrade.
///
/// # Trust boundary
///
/// [`new`](Self::new) only checks the shape of the reference, so any caller can build one.
/// Construct confirmations only in the code path that has verified the gateway's callback or
/// API response, and never from end-user input. [`UpgradeTransition`] rejects missing or
/// mismatched confirmations but cannot tell a verified one from a forged one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentConfirmation {
    account_id: AccountId,
    plan_id: PlanId,
    payment_ref: String,
    confirmed_at: DateTime<Utc>,
}

impl PaymentConfirmation {
    /// Creates a confirmation after validating the payment reference.
    ///
    /// # Errors
    ///
    /// Returns [`EntitlementError::TransitionNotConfirmed`] if the payment reference is blank,
    /// longer than 128 characters, or contains whitespace or control characters.
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for constructor parameters"
    )]
    pub fn new(
        account_id: AccountId,
        plan_id: PlanId,
        payment_ref: impl Into<String>,
        confirmed_at: DateTime<Utc>,
    ) -> Result<Self> {
        let payment_ref = payment_ref.into();
        if payment_ref.trim().is_empty() {
            return Err(EntitlementError::TransitionNotConfirmed(
                "payment reference is blank".into(),
            ));
        }
        if payment_ref.len() > MAX_PAYMENT_REF_LEN {
            return Err(EntitlementError::TransitionNotConfirmed(format!(
                "payment reference must be {MAX_PAYMENT_REF_LEN} characters or less"
            )));
        }
        if payment_ref.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(EntitlementError::TransitionNotConfirmed(
                "payment reference cannot contain whitespace or control characters".into(),
            ));
        }
        Ok(Self { account_id, plan_id, payment_ref, confirmed_at })
    }

    /// Account that paid.
    #[must_use]
    pub const fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    /// Plan that was paid for.
    #[must_use]
    pub const fn plan_id(&self) -> &PlanId {
        &self.plan_id
    }

    /// Gateway reference of the payment.
    #[must_use]
    pub fn payment_ref(&self) -> &str {
        &self.payment_ref
    }

    /// When the gateway confirmed the payment.
    #[must_use]
    pub const fn confirmed_at(&self) -> DateTime<Utc> {
        self.confirmed_at
    }
}

/// Result of a successful upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeOutcome {
    /// New state for the caller to persist.
    pub state: SubscriptionState,
    /// Days carried over from the previous cycle, already included in the new cycle length.
    pub bonus_days: u32,
    /// Evaluated status just before the upgrade.
    pub previous_status: SubscriptionStatus,
    /// Plan the account was on before the upgrade.
    pub previous_plan_id: PlanId,
    /// Payment that authorized the upgrade.
    pub payment_ref: String,
}

impl UpgradeOutcome {
    /// Confirmation-screen message for carried days, e.g. `"+3 bonus days"`.
    ///
    /// `None` when nothing was carried over.
    #[must_use]
    pub fn bonus_message(&self) -> Option<String> {
        match self.bonus_days {
            0 => None,
            1 => Some("+1 bonus day".to_owned()),
            days => Some(format!("+{days} bonus days")),
        }
    }
}

/// Computes the state that follows a confirmed payment.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use plangate::{
///     account::AccountId,
///     catalog::{PlanCatalog, PlanId},
///     subscriptions::{PaymentConfirmation, SubscriptionState, UpgradeTransition},
/// };
///
/// # fn example() -> plangate::error::Result<()> {
/// let catalog = PlanCatalog::builtin();
/// let now = Utc::now();
/// let state = SubscriptionState::start_trial(&catalog, now - Duration::days(4));
///
/// let monthly = PlanId::new("monthly")?;
/// let payment = PaymentConfirmation::new(AccountId::new("acct-1")?, monthly.clone(), "pay_001", now)?;
///
/// let outcome = UpgradeTransition::new(&catalog).confirmed_by(&payment).apply(&state, &monthly, now)?;
/// assert_eq!(outcome.state.cycle_duration_days, 33);
/// assert_eq!(outcome.bonus_message().as_deref(), Some("+3 bonus days"));
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct UpgradeTransition<'a> {
    catalog: &'a PlanCatalog,
    confirmation: Option<&'a PaymentConfirmation>,
}

impl<'a> UpgradeTransition<'a> {
    /// Creates a transition over `catalog` with no payment attached.
    #[must_use]
    pub const fn new(catalog: &'a PlanCatalog) -> Self {
        Self { catalog, confirmation: None }
    }

    /// Attaches the payment that authorizes the upgrade.
    #[must_use]
    pub const fn confirmed_by(mut self, confirmation: &'a PaymentConfirmation) -> Self {
        self.confirmation = Some(confirmation);
        self
    }

    /// Moves `state` onto `new_plan_id` at `now`.
    ///
    /// The new cycle starts at `now` and lasts the plan's `duration_days` plus the remaining
    /// trial days when the account was still on an unexpired trial. Active and expired accounts
    /// get no bonus, and a stored `carried_bonus_days` is ignored. Usage counters start empty.
    ///
    /// # Errors
    ///
    /// - [`EntitlementError::TransitionNotConfirmed`] if no payment is attached or the payment
    ///   was for a different plan
    /// - [`EntitlementError::UnknownPlan`] if `new_plan_id` or the current plan is not in the
    ///   catalog
    /// - [`EntitlementError::InvalidState`] if `state` fails
    ///   [`SubscriptionState::validate`], e.g. a `trial` status on a paid plan
    /// - [`EntitlementError::InvalidTransition`] if `new_plan_id` is the trial plan, or the new
    ///   cycle length would overflow
    pub fn apply(
        &self,
        state: &SubscriptionState,
        new_plan_id: &PlanId,
        now: DateTime<Utc>,
    ) -> Result<UpgradeOutcome> {
        let confirmation = self.confirmation.ok_or_else(|| {
            EntitlementError::TransitionNotConfirmed(format!(
                "no payment confirmation for upgrade to '{new_plan_id}'"
            ))
        })?;
        if confirmation.plan_id != *new_plan_id {
            return Err(EntitlementError::TransitionNotConfirmed(format!(
                "payment {} confirms plan '{}', not '{new_plan_id}'",
                confirmation.payment_ref, confirmation.plan_id
            )));
        }

        let plan = self.catalog.get_plan(new_plan_id)?;
        if self.catalog.is_trial_plan(new_plan_id) {
            return Err(EntitlementError::InvalidTransition(format!(
                "cannot upgrade into the trial plan '{new_plan_id}'"
            )));
        }

        state.validate(self.catalog)?;
        let before = evaluate(self.catalog, state, now)?;
        let bonus_days =
            if before.status == SubscriptionStatus::Trial { before.remaining_days } else { 0 };
        let cycle_duration_days = plan.duration_days.checked_add(bonus_days).ok_or_else(|| {
            EntitlementError::InvalidTransition(format!(
                "cycle length of '{new_plan_id}' plus {bonus_days} bonus days overflows"
            ))
        })?;

        debug!(
            from_plan = %state.plan_id,
            to_plan = %new_plan_id,
            previous_status = before.status.as_str(),
            bonus_days,
            cycle_duration_days,
            "applied upgrade"
        );

        Ok(UpgradeOutcome {
            state: SubscriptionState {
                plan_id: new_plan_id.clone(),
                status: SubscriptionStatus::Active,
                cycle_started_at: now,
                cycle_duration_days,
                usage_counters: BTreeMap::new(),
                carried_bonus_days: 0,
            },
            bonus_days,
            previous_status: before.status,
            previous_plan_id: state.plan_id.clone(),
            payment_ref: confirmation.payment_ref.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::catalog::ResourceType;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
    }

    fn plan(id: &str) -> PlanId {
        PlanId::new(id).unwrap()
    }

    fn payment(plan_id: &str, reference: &str) -> PaymentConfirmation {
        PaymentConfirmation::new(AccountId::new("acct-42").unwrap(), plan(plan_id), reference, start())
            .unwrap()
    }

    fn expired_monthly() -> SubscriptionState {
        SubscriptionState {
            plan_id: plan("monthly"),
            status: SubscriptionStatus::Active,
            cycle_started_at: start() - Duration::days(40),
            cycle_duration_days: 30,
            usage_counters: BTreeMap::from([(ResourceType::INVOICE, 100)]),
            carried_bonus_days: 0,
        }
    }

    // ========================================================================
    // Bonus Day Tests
    // ========================================================================

    #[test]
    fn test_trial_remaining_days_become_bonus() {
        let catalog = PlanCatalog::builtin();
        let trial = SubscriptionState::start_trial(&catalog, start());
        let now = start() + Duration::days(4);
        let payment = payment("monthly", "pay_100");

        let outcome = UpgradeTransition::new(&catalog)
            .confirmed_by(&payment)
            .apply(&trial, &plan("monthly"), now)
            .unwrap();

        assert_eq!(outcome.bonus_days, 3);
        assert_eq!(outcome.previous_status, SubscriptionStatus::Trial);
        assert_eq!(outcome.previous_plan_id, plan("free-trial"));
        assert_eq!(outcome.state.plan_id, plan("monthly"));
        assert_eq!(outcome.state.status, SubscriptionStatus::Active);
        assert_eq!(outcome.state.cycle_started_at, now);
        assert_eq!(outcome.state.cycle_duration_days, 33);
        assert!(outcome.state.usage_counters.is_empty());
        assert_eq!(outcome.state.carried_bonus_days, 0);
        assert_eq!(outcome.payment_ref, "pay_100");
    }

    #[test]
    fn test_expired_upgrade_has_no_bonus() {
        let catalog = PlanCatalog::builtin();
        let payment = payment("yearly", "pay_101");

        let outcome = UpgradeTransition::new(&catalog)
            .confirmed_by(&payment)
            .apply(&expired_monthly(), &plan("yearly"), start())
            .unwrap();

        assert_eq!(outcome.previous_status, SubscriptionStatus::Expired);
        assert_eq!(outcome.bonus_days, 0);
        assert_eq!(outcome.state.cycle_duration_days, 365);
        assert!(outcome.state.usage_counters.is_empty());
        assert_eq!(outcome.bonus_message(), None);
    }

    #[test]
    fn test_active_upgrade_has_no_bonus() {
        let catalog = PlanCatalog::builtin();
        let mut active = expired_monthly();
        active.cycle_started_at = start() - Duration::days(5);
        let payment = payment("yearly", "pay_102");

        let outcome = UpgradeTransition::new(&catalog)
            .confirmed_by(&payment)
            .apply(&active, &plan("yearly"), start())
            .unwrap();

        assert_eq!(outcome.previous_status, SubscriptionStatus::Active);
        assert_eq!(outcome.bonus_days, 0);
        assert_eq!(outcome.state.cycle_duration_days, 365);
    }

    #[test]
    fn test_expired_trial_has_no_bonus() {
        let catalog = PlanCatalog::builtin();
        let trial = SubscriptionState::start_trial(&catalog, start() - Duration::days(9));
        let payment = payment("weekly", "pay_103");

        let outcome = UpgradeTransition::new(&catalog)
            .confirmed_by(&payment)
            .apply(&trial, &plan("weekly"), start())
            .unwrap();

        assert_eq!(outcome.previous_status, SubscriptionStatus::Expired);
        assert_eq!(outcome.state.cycle_duration_days, 7);
    }

    #[test]
    fn test_stored_carried_days_are_not_credited() {
        let catalog = PlanCatalog::builtin();
        let mut state = expired_monthly();
        state.carried_bonus_days = 2;
        let payment = payment("monthly", "pay_104");

        let outcome = UpgradeTransition::new(&catalog)
            .confirmed_by(&payment)
            .apply(&state, &plan("monthly"), start())
            .unwrap();

        assert_eq!(outcome.previous_status, SubscriptionStatus::Expired);
        assert_eq!(outcome.bonus_days, 0);
        assert_eq!(outcome.state.cycle_duration_days, 30);
        assert_eq!(outcome.state.carried_bonus_days, 0);
    }

    #[test]
    fn test_stored_carried_days_do_not_add_to_trial_bonus() {
        let catalog = PlanCatalog::builtin();
        let mut trial = SubscriptionState::start_trial(&catalog, start() - Duration::days(4));
        trial.carried_bonus_days = 5;
        let payment = payment("monthly", "pay_107");

        let outcome = UpgradeTransition::new(&catalog)
            .confirmed_by(&payment)
            .apply(&trial, &plan("monthly"), start())
            .unwrap();

        assert_eq!(outcome.bonus_days, 3);
        assert_eq!(outcome.state.cycle_duration_days, 33);
    }

    #[test]
    fn test_bonus_message() {
        let catalog = PlanCatalog::builtin();
        let payment = payment("monthly", "pay_105");
        let transition = UpgradeTransition::new(&catalog).confirmed_by(&payment);

        let one_left = SubscriptionState::start_trial(&catalog, start() - Duration::days(6));
        let outcome = transition.apply(&one_left, &plan("monthly"), start()).unwrap();
        assert_eq!(outcome.bonus_message().as_deref(), Some("+1 bonus day"));

        let fresh = SubscriptionState::start_trial(&catalog, start());
        let outcome = transition.apply(&fresh, &plan("monthly"), start()).unwrap();
        assert_eq!(outcome.bonus_message().as_deref(), Some("+7 bonus days"));
    }

    // ========================================================================
    // Rejection Tests
    // ========================================================================

    #[test]
    fn test_apply_without_confirmation_fails() {
        let catalog = PlanCatalog::builtin();
        let trial = SubscriptionState::start_trial(&catalog, start());

        let err = UpgradeTransition::new(&catalog)
            .apply(&trial, &plan("monthly"), start())
            .unwrap_err();
        assert!(matches!(err, EntitlementError::TransitionNotConfirmed(_)));
    }

    #[test]
    fn test_apply_with_payment_for_other_plan_fails() {
        let catalog = PlanCatalog::builtin();
        let trial = SubscriptionState::start_trial(&catalog, start());
        let payment = payment("weekly", "pay_106");

        let err = UpgradeTransition::new(&catalog)
            .confirmed_by(&payment)
            .apply(&trial, &plan("yearly"), start())
            .unwrap_err();
        assert!(matches!(err, EntitlementError::TransitionNotConfirmed(_)));
        assert!(err.to_string().contains("'weekly'"));
    }

    #[test]
    fn test_apply_unknown_plan_fails() {
        let catalog = PlanCatalog::builtin();
        let trial = SubscriptionState::start_trial(&catalog, start());
        let payment = payment("enterprise", "pay_107");

        let err = UpgradeTransition::new(&catalog)
            .confirmed_by(&payment)
            .apply(&trial, &plan("enterprise"), start())
            .unwrap_err();
        assert!(matches!(err, EntitlementError::UnknownPlan(ref id) if id == "enterprise"));
    }

    #[test]
    fn test_apply_into_trial_fails() {
        let catalog = PlanCatalog::builtin();
        let payment = payment("free-trial", "pay_108");

        let err = UpgradeTransition::new(&catalog)
            .confirmed_by(&payment)
            .apply(&expired_monthly(), &plan("free-trial"), start())
            .unwrap_err();
        assert!(matches!(err, EntitlementError::InvalidTransition(_)));
    }

    #[test]
    fn test_apply_rejects_trial_status_on_paid_plan() {
        let catalog = PlanCatalog::builtin();
        let mut state = expired_monthly();
        state.plan_id = plan("yearly");
        state.status = SubscriptionStatus::Trial;
        state.cycle_started_at = start();
        state.cycle_duration_days = 365;
        let payment = payment("monthly", "pay_110");

        let err = UpgradeTransition::new(&catalog)
            .confirmed_by(&payment)
            .apply(&state, &plan("monthly"), start())
            .unwrap_err();
        assert!(matches!(err, EntitlementError::InvalidState(_)));
    }

    #[test]
    fn test_apply_does_not_touch_input() {
        let catalog = PlanCatalog::builtin();
        let state = expired_monthly();
        let snapshot = state.clone();
        let payment = payment("monthly", "pay_109");

        let _outcome = UpgradeTransition::new(&catalog)
            .confirmed_by(&payment)
            .apply(&state, &plan("monthly"), start())
            .unwrap();
        assert_eq!(state, snapshot);
    }

    // ========================================================================
    // PaymentConfirmation Tests
    // ========================================================================

    #[test]
    fn test_confirmation_rejects_blank_reference() {
        let result =
            PaymentConfirmation::new(AccountId::new("acct-1").unwrap(), plan("monthly"), "  ", start());
        assert!(matches!(result.unwrap_err(), EntitlementError::TransitionNotConfirmed(_)));
    }

    #[test]
    fn test_confirmation_rejects_whitespace_and_long_reference() {
        let account = AccountId::new("acct-1").unwrap();
        assert!(
            PaymentConfirmation::new(account.clone(), plan("monthly"), "pay 1", start()).is_err()
        );
        assert!(
            PaymentConfirmation::new(account, plan("monthly"), "p".repeat(129), start()).is_err()
        );
    }

    #[test]
    fn test_confirmation_accessors() {
        let confirmation = payment("weekly", "ch_3Pq9");
        assert_eq!(confirmation.account_id().as_str(), "acct-42");
        assert_eq!(confirmation.plan_id(), &plan("weekly"));
        assert_eq!(confirmation.payment_ref(), "ch_3Pq9");
        assert_eq!(confirmation.confirmed_at(), start());
    }
}
