//! Per-account subscription snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    catalog::{PlanCatalog, PlanId, ResourceType},
    error::{EntitlementError, Result},
};

/// Lifecycle status of a subscription.
///
/// ```text
/// Trial ──────┬─► Active ◄──┐
///             │      │      │ upgrade
///             ▼      ▼      │
///            Expired ───────┘
/// ```
///
/// The stored status is only a hint. [`evaluate`](super::evaluate) derives the authoritative
/// status from elapsed time, so a stored `Active` whose cycle has run out reads as `Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Free trial period.
    Trial,
    /// Paid and within the current cycle.
    Active,
    /// Cycle ran out; all gated features are locked until the next upgrade.
    Expired,
}

impl SubscriptionStatus {
    /// Returns string representation for logs and JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }
}

/// Subscription state of one account.
///
/// Owned by the account-persistence collaborator. The engine never mutates a stored state in
/// place. [`record_usage`](Self::record_usage) and upgrades return new values that the caller
/// persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionState {
    /// Current plan.
    pub plan_id: PlanId,
    /// Stored status (a hint; see [`SubscriptionStatus`]).
    pub status: SubscriptionStatus,
    /// Start of the current cycle.
    pub cycle_started_at: DateTime<Utc>,
    /// Length of the current cycle in days, bonus days included.
    pub cycle_duration_days: u32,
    /// Records created in the current cycle, per resource type.
    #[serde(default)]
    pub usage_counters: BTreeMap<ResourceType, u64>,
    /// Legacy bonus balance; always zero in states the engine produces.
    ///
    /// Upgrades fold the trial bonus into `cycle_duration_days` and report it once in
    /// [`UpgradeOutcome::bonus_days`](super::UpgradeOutcome::bonus_days). Neither evaluation nor
    /// a later upgrade reads this field, so a stale balance is never credited twice.
    #[serde(default)]
    pub carried_bonus_days: u32,
}

impl SubscriptionState {
    /// Starts a new account on the catalog's trial plan at `now`.
    #[must_use]
    pub fn start_trial(catalog: &PlanCatalog, now: DateTime<Utc>) -> Self {
        let trial = catalog.trial_plan();
        Self {
            plan_id: trial.id.clone(),
            status: SubscriptionStatus::Trial,
            cycle_started_at: now,
            cycle_duration_days: trial.duration_days,
            usage_counters: BTreeMap::new(),
            carried_bonus_days: 0,
        }
    }

    /// Checks the state's invariants against `catalog`.
    ///
    /// # Errors
    ///
    /// - [`EntitlementError::UnknownPlan`] if the plan is not in the catalog
    /// - [`EntitlementError::InvalidState`] if `cycle_duration_days` is zero, or the status is
    ///   `trial` on a plan other than the trial plan
    pub fn validate(&self, catalog: &PlanCatalog) -> Result<()> {
        catalog.get_plan(&self.plan_id)?;
        if self.cycle_duration_days == 0 {
            return Err(EntitlementError::InvalidState(
                "cycle_duration_days must be positive".into(),
            ));
        }
        if self.status == SubscriptionStatus::Trial && !catalog.is_trial_plan(&self.plan_id) {
            return Err(EntitlementError::InvalidState(format!(
                "status is trial but plan '{}' is not the trial plan",
                self.plan_id
            )));
        }
        Ok(())
    }

    /// End of the current cycle.
    #[must_use]
    pub fn cycle_ends_at(&self) -> DateTime<Utc> {
        self.cycle_started_at
            .checked_add_signed(Duration::days(i64::from(self.cycle_duration_days)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Records created this cycle for `resource`.
    #[must_use]
    pub fn usage(&self, resource: &ResourceType) -> u64 {
        self.usage_counters.get(resource).copied().unwrap_or(0)
    }

    /// Returns a copy with one more record of `resource` counted.
    ///
    /// Called after the record-creation collaborator confirmed the record was created.
    #[must_use]
    pub fn record_usage(mut self, resource: &ResourceType) -> Self {
        let counter = self.usage_counters.entry(resource.clone()).or_insert(0);
        *counter = counter.saturating_add(1);
        self
    }
}
