//! Engine configuration types.
//!
//! TOML-deserializable configuration for the plan catalog and engine settings.
//!
//! ```toml
//! trial_plan = "free-trial"
//!
//! [settings]
//! expiry_warning_days = 3
//!
//! [[plans]]
//! id = "free-trial"
//! name = "Free Trial"
//! billing_period = "trial"
//! features = ["advanced_analytics"]
//! quotas = { invoice = 20, customer = 10 }
//!
//! [[plans]]
//! id = "monthly"
//! name = "Monthly"
//! price_minor_units = 2900
//! billing_period = "monthly"
//! quotas = { invoice = 100 }
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use serde::Deserialize;

use super::{
    models::{BillingPeriod, FeatureId, Plan, PlanId, ResourceType},
    plans::PlanCatalog,
};
use crate::error::{EntitlementError, Result};

/// Root engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Id of the plan new accounts start on.
    pub trial_plan: PlanId,

    /// Plans in display order.
    pub plans: Vec<PlanConfig>,

    /// Engine settings.
    #[serde(default)]
    pub settings: EngineSettings,
}

/// One `[[plans]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanConfig {
    /// Unique plan identifier.
    pub id: PlanId,

    /// Display name.
    pub name: String,

    /// Price per cycle in minor currency units (default: 0).
    #[serde(default)]
    pub price_minor_units: u64,

    /// Currency code (default: "USD").
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Billing period.
    pub billing_period: BillingPeriod,

    /// Cycle length override in days (default: the billing period's nominal length).
    pub duration_days: Option<u32>,

    /// Features granted.
    #[serde(default)]
    pub features: BTreeSet<FeatureId>,

    /// Per-cycle quotas; omitted resources are unlimited.
    #[serde(default)]
    pub quotas: BTreeMap<ResourceType, u64>,
}

impl PlanConfig {
    /// Validates a single plan entry.
    ///
    /// # Errors
    ///
    /// Returns error if the name is blank, the currency is not a three-letter code, or the
    /// duration override is zero or longer than ten years.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EntitlementError::CatalogConfigError(format!(
                "plan '{}' must have a name",
                self.id
            )));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(EntitlementError::CatalogConfigError(format!(
                "plan '{}' currency must be a three-letter ISO 4217 code, got: {}",
                self.id, self.currency
            )));
        }
        if let Some(days) = self.duration_days
            && (days == 0 || days > MAX_DURATION_DAYS)
        {
            return Err(EntitlementError::CatalogConfigError(format!(
                "plan '{}' duration_days must be between 1 and {MAX_DURATION_DAYS}",
                self.id
            )));
        }
        Ok(())
    }

    fn into_plan(self) -> Plan {
        Plan {
            duration_days: self.duration_days.unwrap_or(self.billing_period.nominal_days()),
            id: self.id,
            name: self.name,
            price_minor_units: self.price_minor_units,
            currency: self.currency,
            billing_period: self.billing_period,
            features: self.features,
            quotas: self.quotas,
        }
    }
}

const MAX_DURATION_DAYS: u32 = 3650;

/// Engine-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EngineSettings {
    /// Remaining-days threshold at which the UI shows an "expiring soon" warning.
    #[serde(default = "default_expiry_warning_days")]
    pub expiry_warning_days: u32,

    /// How many processed payment references are remembered for replay protection.
    #[serde(default = "default_payment_replay_capacity")]
    pub payment_replay_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            expiry_warning_days: default_expiry_warning_days(),
            payment_replay_capacity: default_payment_replay_capacity(),
        }
    }
}

fn default_currency() -> String {
    "USD".to_owned()
}
fn default_expiry_warning_days() -> u32 {
    3
}
fn default_payment_replay_capacity() -> usize {
    10_000
}

impl EngineSettings {
    /// Validates engine settings.
    ///
    /// # Errors
    ///
    /// Returns error if `expiry_warning_days` is outside 1-30 or the replay capacity is zero.
    pub fn validate(&self) -> Result<()> {
        if self.expiry_warning_days == 0 || self.expiry_warning_days > 30 {
            return Err(EntitlementError::CatalogConfigError(
                "expiry_warning_days must be between 1 and 30".into(),
            ));
        }
        if self.payment_replay_capacity == 0 {
            return Err(EntitlementError::CatalogConfigError(
                "payment_replay_capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if TOML parsing or validation fails.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| {
            EntitlementError::CatalogConfigError(format!("invalid TOML config: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or the configuration is invalid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            EntitlementError::CatalogConfigError(format!("cannot read config file: {e}"))
        })?;
        Self::from_toml(&content)
    }

    /// Validates the complete configuration.
    ///
    /// Catalog-level rules (unique ids, free trial plan, at least one paid plan) are checked
    /// again by [`PlanCatalog::new`] when the catalog is built.
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.plans.is_empty() {
            return Err(EntitlementError::CatalogConfigError("no plans configured".into()));
        }
        for plan in &self.plans {
            plan.validate()?;
        }
        self.settings.validate()?;
        Ok(())
    }

    /// Builds the plan catalog described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the plans do not form a valid catalog.
    pub fn into_catalog(self) -> Result<(PlanCatalog, EngineSettings)> {
        let plans = self.plans.into_iter().map(PlanConfig::into_plan).collect();
        let catalog = PlanCatalog::new(plans, self.trial_plan)?;
        Ok((catalog, self.settings))
    }
}
