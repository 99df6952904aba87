//! Command implementations.
//!
//! Each command turns its inputs into a JSON value; `main` prints it. File access stays in
//! [`Context::load`] and [`read_state`] so the commands themselves are plain functions.

use std::{fs, path::Path};

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use plangate::{
    account::AccountId,
    catalog::{EngineConfig, EngineSettings, FeatureId, Plan, PlanCatalog, PlanId, ResourceType},
    subscriptions::{
        EntitlementView, GateDecision, PaymentConfirmation, SubscriptionState, UpgradeOutcome,
        UpgradeTransition, check, check_feature, evaluate,
    },
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::cli::{CheckArgs, RecordArgs, UpgradeArgs};

/// Catalog, settings and evaluation instant shared by all commands.
#[derive(Debug)]
pub struct Context {
    pub catalog: PlanCatalog,
    pub settings: EngineSettings,
    pub now: DateTime<Utc>,
}

impl Context {
    /// Loads the catalog from `config` (builtin when absent) and fixes `now`.
    pub fn load(config: Option<&Path>, now: Option<DateTime<Utc>>) -> Result<Self> {
        let (catalog, settings) = match config {
            Some(path) => {
                debug!(path = %path.display(), "loading catalog config");
                EngineConfig::from_file(path)?.into_catalog()?
            }
            None => (PlanCatalog::builtin(), EngineSettings::default()),
        };
        Ok(Self { catalog, settings, now: now.unwrap_or_else(Utc::now) })
    }
}

/// Reads and validates a subscription state file.
pub fn read_state(ctx: &Context, path: &Path) -> Result<SubscriptionState> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("cannot read state file {}", path.display()))?;
    parse_state(ctx, &raw).with_context(|| format!("invalid state file {}", path.display()))
}

fn parse_state(ctx: &Context, raw: &str) -> Result<SubscriptionState> {
    let state: SubscriptionState = serde_json::from_str(raw)?;
    state.validate(&ctx.catalog)?;
    Ok(state)
}

#[derive(Serialize)]
struct PlanEntry<'a> {
    #[serde(flatten)]
    plan: &'a Plan,
    price: String,
    trial: bool,
}

#[derive(Serialize)]
struct EvaluateOutput<'a> {
    #[serde(flatten)]
    view: &'a EntitlementView,
    expiring_soon: bool,
}

#[derive(Serialize)]
struct UpgradeOutput {
    #[serde(flatten)]
    outcome: UpgradeOutcome,
    bonus_message: Option<String>,
}

#[derive(Serialize)]
struct CheckOutput {
    #[serde(flatten)]
    decision: GateDecision,
    prompt: Option<String>,
}

/// `plans`: the catalog in display order.
pub fn plans(ctx: &Context) -> Result<Value> {
    let entries: Vec<_> = ctx
        .catalog
        .list_plans()
        .iter()
        .map(|plan| PlanEntry {
            plan,
            price: plan.price_display(),
            trial: ctx.catalog.is_trial_plan(&plan.id),
        })
        .collect();
    Ok(serde_json::to_value(entries)?)
}

/// `trial`: the state of a new account.
pub fn trial(ctx: &Context) -> Result<Value> {
    let state = SubscriptionState::start_trial(&ctx.catalog, ctx.now);
    info!(plan_id = %state.plan_id, "trial state created");
    Ok(serde_json::to_value(state)?)
}

/// `evaluate`: entitlements of `state` at `now`.
pub fn evaluate_state(ctx: &Context, state: &SubscriptionState) -> Result<Value> {
    let view = evaluate(&ctx.catalog, state, ctx.now)?;
    let expiring_soon = view.is_expiring_within(ctx.settings.expiry_warning_days);
    Ok(serde_json::to_value(EvaluateOutput { view: &view, expiring_soon })?)
}

/// `upgrade`: applies a payment to `state`.
pub fn upgrade(ctx: &Context, state: &SubscriptionState, args: &UpgradeArgs) -> Result<Value> {
    let plan_id = PlanId::new(args.plan.as_str())?;
    let payment = PaymentConfirmation::new(
        AccountId::new(args.account.as_str())?,
        plan_id.clone(),
        args.payment_ref.as_str(),
        ctx.now,
    )?;
    let outcome =
        UpgradeTransition::new(&ctx.catalog).confirmed_by(&payment).apply(state, &plan_id, ctx.now)?;
    info!(
        plan_id = %plan_id,
        bonus_days = outcome.bonus_days,
        cycle_duration_days = outcome.state.cycle_duration_days,
        "upgrade applied"
    );

    let bonus_message = outcome.bonus_message();
    Ok(serde_json::to_value(UpgradeOutput { outcome, bonus_message })?)
}

/// `check`: quota or feature gate decision.
pub fn check_gate(ctx: &Context, state: &SubscriptionState, args: &CheckArgs) -> Result<Value> {
    let view = evaluate(&ctx.catalog, state, ctx.now)?;
    let decision = match (&args.target.resource, &args.target.feature) {
        (Some(resource), _) => check(&view, &ResourceType::new(resource.as_str())?),
        (None, Some(feature)) => check_feature(&view, &FeatureId::new(feature.as_str())?),
        (None, None) => anyhow::bail!("either --resource or --feature is required"),
    };
    let prompt = decision.prompt();
    Ok(serde_json::to_value(CheckOutput { decision, prompt })?)
}

/// `record`: counts one created record.
pub fn record(state: SubscriptionState, args: &RecordArgs) -> Result<Value> {
    let resource = ResourceType::new(args.resource.as_str())?;
    Ok(serde_json::to_value(state.record_usage(&resource))?)
}
