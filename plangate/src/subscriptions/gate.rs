//! Allow/deny gating for record creation and feature use.
//!
//! Gate decisions are advisory for the UI. The record-creation collaborator re-checks server side
//! before writing anything.

use serde::Serialize;
use tracing::debug;

use super::{entitlement::EntitlementView, state::SubscriptionStatus};
use crate::catalog::{FeatureId, ResourceType};

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    /// The action may proceed.
    Allow,
    /// The action is blocked; the reason drives the upgrade prompt.
    Deny(DenyReason),
}

impl GateDecision {
    /// Whether the action may proceed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// The denial reason, if denied.
    #[must_use]
    pub const fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Allow => None,
            Self::Deny(reason) => Some(reason),
        }
    }

    /// Upgrade prompt to show for a denial.
    #[must_use]
    pub fn prompt(&self) -> Option<String> {
        self.deny_reason().map(DenyReason::prompt)
    }
}

/// Why an action was denied.
///
/// Denials are ordinary results, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenyReason {
    /// The per-cycle quota for a resource is used up.
    QuotaExceeded {
        /// Resource that hit its limit.
        resource: ResourceType,
        /// Plan limit.
        limit: u64,
        /// Records created this cycle.
        used: u64,
    },
    /// The feature is not unlocked for the account right now.
    FeatureLocked {
        /// Locked feature.
        feature: FeatureId,
        /// Evaluated subscription status.
        status: SubscriptionStatus,
    },
}

impl DenyReason {
    /// User-facing upgrade prompt.
    #[must_use]
    pub fn prompt(&self) -> String {
        match self {
            Self::QuotaExceeded { resource, limit, used } => format!(
                "You have reached your {resource} limit ({used} of {limit} this cycle). \
                 Upgrade your plan to create more."
            ),
            Self::FeatureLocked { feature, status: SubscriptionStatus::Expired } => format!(
                "Your subscription has expired. Upgrade to use {}.",
                humanize(feature.as_str())
            ),
            Self::FeatureLocked { feature, .. } => format!(
                "{} is not included in your plan. Upgrade to unlock it.",
                capitalize(&humanize(feature.as_str()))
            ),
        }
    }
}

fn humanize(id: &str) -> String {
    id.replace('_', " ")
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| first.to_uppercase().chain(chars).collect())
}

/// Decides whether one more `resource` record may be created.
///
/// Allows when the resource is unlimited or has quota left. Resource types the plan does not
/// limit are always allowed.
#[must_use]
pub fn check(view: &EntitlementView, resource: &ResourceType) -> GateDecision {
    let access = view.resource(resource);
    match (access.limit, access.remaining) {
        (Some(limit), Some(0)) => {
            debug!(%resource, limit, used = access.used, "quota exhausted");
            GateDecision::Deny(DenyReason::QuotaExceeded {
                resource: resource.clone(),
                limit,
                used: access.used,
            })
        }
        _ => GateDecision::Allow,
    }
}

/// Decides whether `feature` may be used.
///
/// Features the view does not know are locked.
#[must_use]
pub fn check_feature(view: &EntitlementView, feature: &FeatureId) -> GateDecision {
    if view.feature(feature) {
        GateDecision::Allow
    } else {
        debug!(%feature, status = view.status.as_str(), "feature locked");
        GateDecision::Deny(DenyReason::FeatureLocked {
            feature: feature.clone(),
            status: view.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::{
        catalog::{PlanCatalog, PlanId},
        subscriptions::{SubscriptionState, evaluate},
    };

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 14, 0, 0, 0).unwrap()
    }

    fn monthly_view(invoices_used: u64, now: DateTime<Utc>) -> EntitlementView {
        let catalog = PlanCatalog::builtin();
        let state = SubscriptionState {
            plan_id: PlanId::new("monthly").unwrap(),
            status: SubscriptionStatus::Active,
            cycle_started_at: start(),
            cycle_duration_days: 30,
            usage_counters: BTreeMap::from([(ResourceType::INVOICE, invoices_used)]),
            carried_bonus_days: 0,
        };
        evaluate(&catalog, &state, now).unwrap()
    }

    // ========================================================================
    // Quota Tests
    // ========================================================================

    #[test]
    fn test_check_allows_below_limit() {
        let view = monthly_view(99, start());
        assert_eq!(check(&view, &ResourceType::INVOICE), GateDecision::Allow);
    }

    #[test]
    fn test_check_denies_at_limit() {
        let view = monthly_view(100, start());
        let decision = check(&view, &ResourceType::INVOICE);

        assert!(!decision.is_allowed());
        assert_eq!(
            decision.deny_reason(),
            Some(&DenyReason::QuotaExceeded { resource: ResourceType::INVOICE, limit: 100, used: 100 })
        );
    }

    #[test]
    fn test_check_denies_over_limit() {
        let view = monthly_view(250, start());
        let decision = check(&view, &ResourceType::INVOICE);
        assert!(matches!(
            decision,
            GateDecision::Deny(DenyReason::QuotaExceeded { used: 250, limit: 100, .. })
        ));
    }

    #[test]
    fn test_check_allows_unknown_resource() {
        let view = monthly_view(100, start());
        let timesheet = ResourceType::new("timesheet").unwrap();
        assert!(check(&view, &timesheet).is_allowed());
    }

    #[test]
    fn test_check_allows_unlimited_plan() {
        let catalog = PlanCatalog::builtin();
        let state = SubscriptionState {
            plan_id: PlanId::new("yearly").unwrap(),
            status: SubscriptionStatus::Active,
            cycle_started_at: start(),
            cycle_duration_days: 365,
            usage_counters: BTreeMap::from([(ResourceType::CUSTOMER, 1_000_000)]),
            carried_bonus_days: 0,
        };
        let view = evaluate(&catalog, &state, start()).unwrap();
        assert!(check(&view, &ResourceType::CUSTOMER).is_allowed());
    }

    // ========================================================================
    // Feature Tests
    // ========================================================================

    #[test]
    fn test_check_feature_allows_granted() {
        let view = monthly_view(0, start());
        assert!(check_feature(&view, &FeatureId::TEAM_MANAGEMENT).is_allowed());
    }

    #[test]
    fn test_check_feature_denies_missing() {
        let view = monthly_view(0, start());
        let decision = check_feature(&view, &FeatureId::MULTI_CURRENCY);
        assert_eq!(
            decision,
            GateDecision::Deny(DenyReason::FeatureLocked {
                feature: FeatureId::MULTI_CURRENCY,
                status: SubscriptionStatus::Active,
            })
        );
    }

    #[test]
    fn test_check_feature_denies_when_expired() {
        let view = monthly_view(0, start() + Duration::days(31));
        let decision = check_feature(&view, &FeatureId::TEAM_MANAGEMENT);
        assert!(matches!(
            decision,
            GateDecision::Deny(DenyReason::FeatureLocked { status: SubscriptionStatus::Expired, .. })
        ));
    }

    // ========================================================================
    // Prompt Tests
    // ========================================================================

    #[test]
    fn test_prompts() {
        let quota = DenyReason::QuotaExceeded { resource: ResourceType::EXPENSE, limit: 20, used: 20 };
        assert_eq!(
            quota.prompt(),
            "You have reached your expense limit (20 of 20 this cycle). Upgrade your plan to create more."
        );

        let locked = DenyReason::FeatureLocked {
            feature: FeatureId::MULTI_CURRENCY,
            status: SubscriptionStatus::Trial,
        };
        assert_eq!(locked.prompt(), "Multi currency is not included in your plan. Upgrade to unlock it.");

        let expired = DenyReason::FeatureLocked {
            feature: FeatureId::DATA_EXPORT,
            status: SubscriptionStatus::Expired,
        };
        assert_eq!(expired.prompt(), "Your subscription has expired. Upgrade to use data export.");

        assert_eq!(GateDecision::Allow.prompt(), None);
    }

    #[test]
    fn test_decision_serialization() {
        let allow = serde_json::to_value(GateDecision::Allow).unwrap();
        assert_eq!(allow, serde_json::json!({ "decision": "allow" }));

        let deny = serde_json::to_value(GateDecision::Deny(DenyReason::QuotaExceeded {
            resource: ResourceType::INVOICE,
            limit: 100,
            used: 100,
        }))
        .unwrap();
        assert_eq!(
            deny,
            serde_json::json!({
                "decision": "deny",
                "reason": "quota_exceeded",
                "resource": "invoice",
                "limit": 100,
                "used": 100
            })
        );
    }
}
