use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use crate::{
    account::AccountId,
    error::EntitlementError,
    catalog::{PlanCatalog, PlanId, ResourceType},
    subscriptions::{
        PaymentConfirmation, SubscriptionState, SubscriptionStatus, UpgradeTransition, check,
        evaluate,
    },
};

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

fn status_strategy() -> impl Strategy<Value = SubscriptionStatus> {
    prop_oneof![
        Just(SubscriptionStatus::Trial),
        Just(SubscriptionStatus::Active),
        Just(SubscriptionStatus::Expired),
    ]
}

fn paid_status_strategy() -> impl Strategy<Value = SubscriptionStatus> {
    prop_oneof![Just(SubscriptionStatus::Active), Just(SubscriptionStatus::Expired)]
}

fn paid_plan_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("weekly"), Just("monthly"), Just("yearly")]
}

fn state(plan: &str, status: SubscriptionStatus, duration: u32, used: u64) -> SubscriptionState {
    SubscriptionState {
        plan_id: PlanId::new(plan).unwrap(),
        status,
        cycle_started_at: epoch(),
        cycle_duration_days: duration,
        usage_counters: BTreeMap::from([(ResourceType::INVOICE, used)]),
        carried_bonus_days: 0,
    }
}

fn confirmation(plan: &str) -> PaymentConfirmation {
    PaymentConfirmation::new(
        AccountId::new("acct-prop").unwrap(),
        PlanId::new(plan).unwrap(),
        "pay_prop",
        epoch(),
    )
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_remaining_days_bounded_by_cycle(
        plan in paid_plan_strategy(),
        status in status_strategy(),
        duration in 1_u32..800,
        offset_minutes in -20_000_i64..2_000_000,
    ) {
        let catalog = PlanCatalog::builtin();
        let state = state(plan, status, duration, 0);
        let now = epoch() + Duration::minutes(offset_minutes);

        let view = evaluate(&catalog, &state, now).unwrap();
        prop_assert!(view.remaining_days <= duration);
    }

    #[test]
    fn test_zero_remaining_means_expired(
        plan in paid_plan_strategy(),
        status in status_strategy(),
        duration in 1_u32..800,
        offset_minutes in -20_000_i64..2_000_000,
    ) {
        let catalog = PlanCatalog::builtin();
        let state = state(plan, status, duration, 0);
        let now = epoch() + Duration::minutes(offset_minutes);

        let view = evaluate(&catalog, &state, now).unwrap();
        prop_assert_eq!(view.remaining_days == 0, view.status == SubscriptionStatus::Expired);
        if view.is_expired() {
            prop_assert!(view.feature_access.values().all(|granted| !granted));
        }
    }

    #[test]
    fn test_evaluate_is_idempotent(
        status in status_strategy(),
        duration in 1_u32..800,
        used in 0_u64..500,
        offset_minutes in -20_000_i64..2_000_000,
    ) {
        let catalog = PlanCatalog::builtin();
        let state = state("monthly", status, duration, used);
        let now = epoch() + Duration::minutes(offset_minutes);

        let first = evaluate(&catalog, &state, now).unwrap();
        let second = evaluate(&catalog, &state, now).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_clock_skew_keeps_full_cycle(
        duration in 1_u32..800,
        minutes_before in 1_i64..100_000,
    ) {
        let catalog = PlanCatalog::builtin();
        let state = state("monthly", SubscriptionStatus::Active, duration, 0);

        let view = evaluate(&catalog, &state, epoch() - Duration::minutes(minutes_before)).unwrap();
        prop_assert_eq!(view.remaining_days, duration);
    }

    #[test]
    fn test_trial_upgrade_carries_remaining_days(
        plan in paid_plan_strategy(),
        elapsed_hours in 0_i64..(7 * 24),
    ) {
        let catalog = PlanCatalog::builtin();
        let trial = SubscriptionState::start_trial(&catalog, epoch());
        let now = epoch() + Duration::hours(elapsed_hours);
        let remaining = evaluate(&catalog, &trial, now).unwrap().remaining_days;
        prop_assume!(remaining > 0);

        let plan_id = PlanId::new(plan).unwrap();
        let payment = confirmation(plan);
        let outcome = UpgradeTransition::new(&catalog)
            .confirmed_by(&payment)
            .apply(&trial, &plan_id, now)
            .unwrap();

        let plan_days = catalog.get_plan(&plan_id).unwrap().duration_days;
        prop_assert_eq!(outcome.bonus_days, remaining);
        prop_assert_eq!(outcome.state.cycle_duration_days, plan_days + remaining);
        prop_assert_eq!(outcome.state.status, SubscriptionStatus::Active);
        prop_assert!(outcome.state.usage_counters.is_empty());
    }

    #[test]
    fn test_expired_upgrade_gets_plain_cycle(
        from in paid_plan_strategy(),
        to in paid_plan_strategy(),
        status in paid_status_strategy(),
        carried in 0_u32..400,
        days_past_end in 0_i64..1000,
    ) {
        let catalog = PlanCatalog::builtin();
        let mut state = state(from, status, 30, 10);
        state.carried_bonus_days = carried;
        let now = epoch() + Duration::days(30 + days_past_end);

        let to_id = PlanId::new(to).unwrap();
        let payment = confirmation(to);
        let outcome = UpgradeTransition::new(&catalog)
            .confirmed_by(&payment)
            .apply(&state, &to_id, now)
            .unwrap();

        prop_assert_eq!(outcome.previous_status, SubscriptionStatus::Expired);
        prop_assert_eq!(outcome.bonus_days, 0);
        prop_assert_eq!(
            outcome.state.cycle_duration_days,
            catalog.get_plan(&to_id).unwrap().duration_days
        );
        prop_assert_eq!(outcome.state.carried_bonus_days, 0);
    }

    #[test]
    fn test_active_upgrade_gets_plain_cycle(
        from in paid_plan_strategy(),
        to in paid_plan_strategy(),
        carried in 0_u32..400,
        days_in in 0_i64..30,
    ) {
        let catalog = PlanCatalog::builtin();
        let mut state = state(from, SubscriptionStatus::Active, 30, 10);
        state.carried_bonus_days = carried;
        let now = epoch() + Duration::days(days_in);

        let to_id = PlanId::new(to).unwrap();
        let payment = confirmation(to);
        let outcome = UpgradeTransition::new(&catalog)
            .confirmed_by(&payment)
            .apply(&state, &to_id, now)
            .unwrap();

        prop_assert_eq!(outcome.previous_status, SubscriptionStatus::Active);
        prop_assert_eq!(outcome.bonus_days, 0);
        prop_assert_eq!(
            outcome.state.cycle_duration_days,
            catalog.get_plan(&to_id).unwrap().duration_days
        );
    }

    #[test]
    fn test_trial_status_on_paid_plan_never_earns_bonus(
        from in paid_plan_strategy(),
        to in paid_plan_strategy(),
        duration in 1_u32..800,
        offset_days in 0_i64..1000,
    ) {
        let catalog = PlanCatalog::builtin();
        let state = state(from, SubscriptionStatus::Trial, duration, 0);
        let now = epoch() + Duration::days(offset_days);

        let view = evaluate(&catalog, &state, now).unwrap();
        prop_assert_ne!(view.status, SubscriptionStatus::Trial);

        let payment = confirmation(to);
        let err = UpgradeTransition::new(&catalog)
            .confirmed_by(&payment)
            .apply(&state, &PlanId::new(to).unwrap(), now)
            .unwrap_err();
        prop_assert!(matches!(err, EntitlementError::InvalidState(_)));
    }

    #[test]
    fn test_quota_monotonicity(used in 0_u64..400) {
        let catalog = PlanCatalog::builtin();
        let limit = catalog
            .get_plan(&PlanId::new("monthly").unwrap())
            .unwrap()
            .quota(&ResourceType::INVOICE)
            .unwrap();
        let state = state("monthly", SubscriptionStatus::Active, 30, used);

        let view = evaluate(&catalog, &state, epoch()).unwrap();
        prop_assert_eq!(check(&view, &ResourceType::INVOICE).is_allowed(), used < limit);
    }

    #[test]
    fn test_unlimited_always_allows(used in any::<u64>()) {
        let catalog = PlanCatalog::builtin();
        let state = state("yearly", SubscriptionStatus::Active, 365, used);

        let view = evaluate(&catalog, &state, epoch()).unwrap();
        prop_assert!(check(&view, &ResourceType::INVOICE).is_allowed());
    }
}
