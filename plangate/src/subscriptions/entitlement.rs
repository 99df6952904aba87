//! Entitlement evaluation.
//!
//! [`evaluate`] is the single answer to "what may this account do right now". Pages branch on
//! the returned [`EntitlementView`] instead of re-deriving trial and expiry flags themselves.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::state::{SubscriptionState, SubscriptionStatus};
use crate::{
    catalog::{FeatureId, PlanCatalog, PlanId, ResourceType},
    error::Result,
};

/// Quota position for one resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceAccess {
    /// Per-cycle limit, `None` when unlimited.
    pub limit: Option<u64>,
    /// Records created this cycle.
    pub used: u64,
    /// Records still allowed this cycle, `None` when unlimited.
    pub remaining: Option<u64>,
}

impl ResourceAccess {
    fn new(limit: Option<u64>, used: u64) -> Self {
        Self { limit, used, remaining: limit.map(|limit| limit.saturating_sub(used)) }
    }

    /// Whether the limit is reached. Always false for unlimited resources.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self.remaining, Some(0))
    }

    /// Fraction of the quota used, for progress bars. `None` when unlimited.
    ///
    /// A zero limit reads as fully used.
    #[must_use]
    #[allow(clippy::cast_precision_loss, reason = "display ratio, precision loss is harmless")]
    pub fn usage_ratio(&self) -> Option<f64> {
        self.limit.map(|limit| {
            if limit == 0 {
                1.0
            } else {
                (self.used as f64 / limit as f64).min(1.0)
            }
        })
    }
}

/// Derived, read-only entitlements of one account at one instant.
///
/// Built fresh by every [`evaluate`] call and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementView {
    /// Plan the account is on.
    pub plan_id: PlanId,
    /// Authoritative status.
    pub status: SubscriptionStatus,
    /// Whole days of access left in the cycle.
    pub remaining_days: u32,
    /// Start of the current cycle.
    pub cycle_started_at: DateTime<Utc>,
    /// End of the current cycle.
    pub cycle_ends_at: DateTime<Utc>,
    /// Access per catalog feature. Features missing here are locked.
    pub feature_access: BTreeMap<FeatureId, bool>,
    /// Quota per resource type with a limit or recorded usage.
    pub resource_access: BTreeMap<ResourceType, ResourceAccess>,
}

impl EntitlementView {
    /// Whether `feature` is unlocked. Unknown features are locked.
    #[must_use]
    pub fn feature(&self, feature: &FeatureId) -> bool {
        self.feature_access.get(feature).copied().unwrap_or(false)
    }

    /// Quota position for `resource`. Unknown resource types are unrestricted.
    #[must_use]
    pub fn resource(&self, resource: &ResourceType) -> ResourceAccess {
        self.resource_access.get(resource).copied().unwrap_or_default()
    }

    /// Whether the cycle has run out.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.status == SubscriptionStatus::Expired
    }

    /// Whether the account is still on its free trial.
    #[must_use]
    pub fn is_trial(&self) -> bool {
        self.status == SubscriptionStatus::Trial
    }

    /// Whether access ends within `days` days (and has not ended yet).
    #[must_use]
    pub fn is_expiring_within(&self, days: u32) -> bool {
        !self.is_expired() && self.remaining_days <= days
    }
}

/// Whole days between `start` and `now`, clamped to zero when `now` precedes `start`.
fn elapsed_days(start: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    u64::try_from((now - start).num_days()).unwrap_or(0)
}

/// Evaluates `state` against `catalog` at `now`.
///
/// - `remaining_days = max(0, cycle_duration_days - floor(now - cycle_started_at))`
/// - zero remaining days means `Expired` whatever the stored status says
/// - `Trial` is reported only for the catalog's trial plan; a stored `trial` on a paid plan
///   reads as `Active`
/// - an expired account has every feature locked
/// - quotas cover every resource with a plan limit or recorded usage
///
/// # Errors
///
/// Returns [`EntitlementError::UnknownPlan`](crate::error::EntitlementError::UnknownPlan) if the
/// state's plan is not in the catalog.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use plangate::{
///     catalog::PlanCatalog,
///     subscriptions::{SubscriptionState, SubscriptionStatus, evaluate},
/// };
///
/// # fn example() -> plangate::error::Result<()> {
/// let catalog = PlanCatalog::builtin();
/// let now = Utc::now();
/// let state = SubscriptionState::start_trial(&catalog, now - Duration::days(2));
///
/// let view = evaluate(&catalog, &state, now)?;
/// assert_eq!(view.remaining_days, 5);
/// assert_eq!(view.status, SubscriptionStatus::Trial);
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub fn evaluate(
    catalog: &PlanCatalog,
    state: &SubscriptionState,
    now: DateTime<Utc>,
) -> Result<EntitlementView> {
    let plan = catalog.get_plan(&state.plan_id)?;

    let elapsed = elapsed_days(state.cycle_started_at, now);
    let remaining = u64::from(state.cycle_duration_days).saturating_sub(elapsed);
    let remaining_days = u32::try_from(remaining).unwrap_or(state.cycle_duration_days);

    let status = if remaining_days == 0 {
        SubscriptionStatus::Expired
    } else if state.status == SubscriptionStatus::Trial && catalog.is_trial_plan(&state.plan_id) {
        SubscriptionStatus::Trial
    } else {
        SubscriptionStatus::Active
    };

    let unlocked = status != SubscriptionStatus::Expired;
    let feature_access = catalog
        .features()
        .into_iter()
        .map(|feature| (feature.clone(), unlocked && plan.grants(feature)))
        .collect();

    let resource_access = plan
        .quotas
        .keys()
        .chain(state.usage_counters.keys())
        .map(|resource| {
            (resource.clone(), ResourceAccess::new(plan.quota(resource), state.usage(resource)))
        })
        .collect();

    debug!(
        plan_id = %state.plan_id,
        stored_status = state.status.as_str(),
        status = status.as_str(),
        remaining_days,
        "evaluated entitlements"
    );

    Ok(EntitlementView {
        plan_id: state.plan_id.clone(),
        status,
        remaining_days,
        cycle_started_at: state.cycle_started_at,
        cycle_ends_at: state.cycle_ends_at(),
        feature_access,
        resource_access,
    })
}
