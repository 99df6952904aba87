//! Plan catalog data models.
//!
//! Identifiers are validated newtypes so that a typo in a configuration file or a stored state is
//! rejected at the boundary instead of silently matching nothing.

use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use serde::{Deserialize, Serialize};

use crate::error::{EntitlementError, Result};

/// Maximum length of any identifier.
const MAX_ID_LEN: usize = 64;

/// Unique identifier for a plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlanId(pub(super) String);

impl PlanId {
    /// Creates a new plan ID after validation.
    ///
    /// # Errors
    ///
    /// Returns error if ID is empty, exceeds 64 characters, or contains invalid characters.
    /// Only alphanumeric characters, hyphens, and underscores are allowed.
    pub fn new<S: Into<String>>(id: S) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(EntitlementError::InvalidPlanId("plan_id cannot be empty".into()));
        }
        if id.len() > MAX_ID_LEN {
            return Err(EntitlementError::InvalidPlanId(
                "plan_id must be 64 characters or less".into(),
            ));
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(EntitlementError::InvalidPlanId(format!(
                "plan_id can only contain alphanumeric characters, hyphens, and underscores: {id}"
            )));
        }
        Ok(Self(id))
    }

    /// Returns the inner string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PlanId {
    type Error = EntitlementError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<PlanId> for String {
    fn from(id: PlanId) -> Self {
        id.0
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_identifier(kind: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(EntitlementError::InvalidIdentifier(format!("{kind} cannot be empty")));
    }
    if id.len() > MAX_ID_LEN {
        return Err(EntitlementError::InvalidIdentifier(format!(
            "{kind} must be 64 characters or less"
        )));
    }
    if !id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        return Err(EntitlementError::InvalidIdentifier(format!(
            "{kind} can only contain lowercase letters, digits, and underscores: {id}"
        )));
    }
    Ok(())
}

/// Identifier of a gated feature.
///
/// Well-known features are available as associated constants; catalogs may define more.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeatureId(Cow<'static, str>);

impl FeatureId {
    /// Charts and trend reports on the analytics page.
    pub const ADVANCED_ANALYTICS: Self = Self(Cow::Borrowed("advanced_analytics"));
    /// Inviting and managing team members.
    pub const TEAM_MANAGEMENT: Self = Self(Cow::Borrowed("team_management"));
    /// Scheduled, automatically re-issued invoices.
    pub const RECURRING_INVOICES: Self = Self(Cow::Borrowed("recurring_invoices"));
    /// CSV and PDF export of records.
    pub const DATA_EXPORT: Self = Self(Cow::Borrowed("data_export"));
    /// Invoicing in more than one currency.
    pub const MULTI_CURRENCY: Self = Self(Cow::Borrowed("multi_currency"));
    /// Priority support channel.
    pub const PRIORITY_SUPPORT: Self = Self(Cow::Borrowed("priority_support"));

    /// Creates a feature id after validation.
    ///
    /// # Errors
    ///
    /// Returns [`EntitlementError::InvalidIdentifier`] for empty, overlong, or non
    /// `[a-z0-9_]` ids.
    pub fn new<S: Into<String>>(id: S) -> Result<Self> {
        let id = id.into();
        validate_identifier("feature id", &id)?;
        Ok(Self(Cow::Owned(id)))
    }

    /// Returns the inner string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FeatureId {
    type Error = EntitlementError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<FeatureId> for String {
    fn from(id: FeatureId) -> Self {
        id.0.into_owned()
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of record whose creation is counted against a quota.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceType(Cow<'static, str>);

impl ResourceType {
    /// Invoices issued.
    pub const INVOICE: Self = Self(Cow::Borrowed("invoice"));
    /// Expenses recorded.
    pub const EXPENSE: Self = Self(Cow::Borrowed("expense"));
    /// Customers created.
    pub const CUSTOMER: Self = Self(Cow::Borrowed("customer"));
    /// Products or services in the catalog.
    pub const PRODUCT: Self = Self(Cow::Borrowed("product"));

    /// Creates a resource type after validation.
    ///
    /// # Errors
    ///
    /// Returns [`EntitlementError::InvalidIdentifier`] for empty, overlong, or non
    /// `[a-z0-9_]` names.
    pub fn new<S: Into<String>>(name: S) -> Result<Self> {
        let name = name.into();
        validate_identifier("resource type", &name)?;
        Ok(Self(Cow::Owned(name)))
    }

    /// Returns the inner string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourceType {
    type Error = EntitlementError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ResourceType> for String {
    fn from(resource: ResourceType) -> Self {
        resource.0.into_owned()
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Billing period a plan is sold for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    /// Free trial, not billed.
    Trial,
    /// Billed every week.
    Weekly,
    /// Billed every month.
    Monthly,
    /// Billed every year.
    Yearly,
}

impl BillingPeriod {
    /// Default cycle length for the period, in days.
    #[must_use]
    pub const fn nominal_days(self) -> u32 {
        match self {
            Self::Trial | Self::Weekly => 7,
            Self::Monthly => 30,
            Self::Yearly => 365,
        }
    }

    /// Returns human-readable interval description.
    #[must_use]
    pub const fn interval_display(self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Weekly => "week",
            Self::Monthly => "month",
            Self::Yearly => "year",
        }
    }
}

/// Immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique plan identifier.
    pub id: PlanId,
    /// Display name.
    pub name: String,
    /// Price per cycle in minor currency units (cents).
    pub price_minor_units: u64,
    /// Currency code (ISO 4217).
    pub currency: String,
    /// Billing period.
    pub billing_period: BillingPeriod,
    /// Cycle length in days.
    pub duration_days: u32,
    /// Features granted by the plan.
    #[serde(default)]
    pub features: BTreeSet<FeatureId>,
    /// Per-cycle creation limits. A resource type absent here is unlimited.
    #[serde(default)]
    pub quotas: BTreeMap<ResourceType, u64>,
}

impl Plan {
    /// Whether the plan grants `feature`.
    #[must_use]
    pub fn grants(&self, feature: &FeatureId) -> bool {
        self.features.contains(feature)
    }

    /// Per-cycle limit for `resource`, `None` when unlimited.
    #[must_use]
    pub fn quota(&self, resource: &ResourceType) -> Option<u64> {
        self.quotas.get(resource).copied()
    }

    /// Whether the plan costs nothing.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.price_minor_units == 0
    }

    /// Price formatted for display, e.g. `"USD 29.00 / month"`.
    #[must_use]
    pub fn price_display(&self) -> String {
        if self.is_free() {
            return "Free".to_owned();
        }
        format!(
            "{} {}.{:02} / {}",
            self.currency,
            self.price_minor_units / 100,
            self.price_minor_units % 100,
            self.billing_period.interval_display()
        )
    }
}
