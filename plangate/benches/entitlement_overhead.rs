//! Benchmark suite for entitlement evaluation and gating.
//!
//! Pages call `evaluate` on every render, so it has to stay cheap. This benchmark measures:
//! - Evaluation against the builtin catalog, with and without usage counters
//! - Quota and feature gate checks on a prepared view
//!
//! Run with: `cargo bench --bench entitlement_overhead`

#![allow(clippy::let_underscore_must_use, reason = "Criterion benchmarks ignore results")]
#![allow(missing_docs, reason = "Benchmark functions are self-documenting")]

use std::{collections::BTreeMap, hint::black_box};

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use plangate::{
    catalog::{FeatureId, PlanCatalog, PlanId, ResourceType},
    subscriptions::{SubscriptionState, SubscriptionStatus, check, check_feature, evaluate},
};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

fn monthly_state(used: u64) -> SubscriptionState {
    SubscriptionState {
        plan_id: PlanId::new("monthly").unwrap(),
        status: SubscriptionStatus::Active,
        cycle_started_at: start(),
        cycle_duration_days: 30,
        usage_counters: BTreeMap::from([
            (ResourceType::INVOICE, used),
            (ResourceType::EXPENSE, used),
            (ResourceType::CUSTOMER, used / 2),
        ]),
        carried_bonus_days: 0,
    }
}

/// Benchmark evaluation without logging
fn bench_evaluate(c: &mut Criterion) {
    let _ = tracing_subscriber::fmt().with_max_level(tracing::Level::ERROR).try_init();

    let catalog = PlanCatalog::builtin();
    let trial = SubscriptionState::start_trial(&catalog, start());
    let now = start() + Duration::days(3);

    c.bench_function("evaluate_fresh_trial", |b| {
        b.iter(|| {
            let _ = evaluate(black_box(&catalog), black_box(&trial), black_box(now));
        });
    });

    let mut group = c.benchmark_group("evaluate_with_usage");
    for used in [0_u64, 50, 100] {
        let state = monthly_state(used);
        group.bench_with_input(BenchmarkId::from_parameter(used), &state, |b, state| {
            b.iter(|| {
                let _ = evaluate(black_box(&catalog), black_box(state), black_box(now));
            });
        });
    }
    group.finish();
}

/// Benchmark gate checks on a prepared view
fn bench_gates(c: &mut Criterion) {
    let catalog = PlanCatalog::builtin();
    let view = evaluate(&catalog, &monthly_state(100), start()).unwrap();

    c.bench_function("check_quota_denied", |b| {
        b.iter(|| check(black_box(&view), black_box(&ResourceType::INVOICE)));
    });

    c.bench_function("check_quota_allowed", |b| {
        b.iter(|| check(black_box(&view), black_box(&ResourceType::PRODUCT)));
    });

    c.bench_function("check_feature_locked", |b| {
        b.iter(|| check_feature(black_box(&view), black_box(&FeatureId::MULTI_CURRENCY)));
    });
}

criterion_group!(benches, bench_evaluate, bench_gates);
criterion_main!(benches);
