//! The plan catalog.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::models::{BillingPeriod, FeatureId, Plan, PlanId, ResourceType};
use crate::error::{EntitlementError, Result};

/// Read-only catalog of every plan the product sells, plus the designated trial plan.
///
/// Plans keep the order they were configured in; that order is the upgrade-offer display order.
///
/// # Examples
///
/// ```
/// use plangate::catalog::{PlanCatalog, PlanId};
///
/// # fn example() -> plangate::error::Result<()> {
/// let catalog = PlanCatalog::builtin();
/// let monthly = catalog.get_plan(&PlanId::new("monthly")?)?;
/// assert_eq!(monthly.duration_days, 30);
/// assert_eq!(catalog.trial_plan().duration_days, 7);
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
    index: HashMap<PlanId, usize>,
    trial_plan_id: PlanId,
}

impl PlanCatalog {
    /// Builds a catalog from plans in display order.
    ///
    /// # Errors
    ///
    /// Returns [`EntitlementError::CatalogConfigError`] if:
    /// - two plans share an id
    /// - a plan has a zero `duration_days`
    /// - `trial_plan_id` is not among the plans, or the trial plan is not free
    /// - there is no paid plan to upgrade to
    pub fn new(plans: Vec<Plan>, trial_plan_id: PlanId) -> Result<Self> {
        let mut index = HashMap::with_capacity(plans.len());
        for (position, plan) in plans.iter().enumerate() {
            if plan.duration_days == 0 {
                return Err(EntitlementError::CatalogConfigError(format!(
                    "plan '{}' must have a positive duration_days",
                    plan.id
                )));
            }
            if index.insert(plan.id.clone(), position).is_some() {
                return Err(EntitlementError::CatalogConfigError(format!(
                    "duplicate plan id '{}'",
                    plan.id
                )));
            }
        }

        let trial = index.get(&trial_plan_id).map(|&i| &plans[i]).ok_or_else(|| {
            EntitlementError::CatalogConfigError(format!(
                "trial plan '{trial_plan_id}' is not in the catalog"
            ))
        })?;
        if !trial.is_free() {
            return Err(EntitlementError::CatalogConfigError(format!(
                "trial plan '{trial_plan_id}' must have a zero price"
            )));
        }
        if plans.iter().all(|plan| plan.id == trial_plan_id) {
            return Err(EntitlementError::CatalogConfigError(
                "catalog must offer at least one paid plan".to_owned(),
            ));
        }

        Ok(Self { plans, index, trial_plan_id })
    }

    /// The catalog the product ships with.
    ///
    /// | Plan | Days | Price | Invoices | Expenses | Customers | Products |
    /// |------|------|-------|----------|----------|-----------|----------|
    /// | `free-trial` | 7 | 0 | 20 | 20 | 10 | 10 |
    /// | `weekly` | 7 | 9.00 | 50 | 50 | 25 | 25 |
    /// | `monthly` | 30 | 29.00 | 100 | 200 | 100 | 100 |
    /// | `yearly` | 365 | 290.00 | unlimited | unlimited | unlimited | unlimited |
    #[must_use]
    pub fn builtin() -> Self {
        let quotas = |invoice: u64, expense: u64, customer: u64, product: u64| {
            BTreeMap::from([
                (ResourceType::INVOICE, invoice),
                (ResourceType::EXPENSE, expense),
                (ResourceType::CUSTOMER, customer),
                (ResourceType::PRODUCT, product),
            ])
        };
        let plan = |id: &str,
                    name: &str,
                    price: u64,
                    period: BillingPeriod,
                    features: BTreeSet<FeatureId>,
                    quotas: BTreeMap<ResourceType, u64>| Plan {
            id: PlanId(id.to_owned()),
            name: name.to_owned(),
            price_minor_units: price,
            currency: "USD".to_owned(),
            billing_period: period,
            duration_days: period.nominal_days(),
            features,
            quotas,
        };

        let plans = vec![
            plan(
                "free-trial",
                "Free Trial",
                0,
                BillingPeriod::Trial,
                BTreeSet::from([FeatureId::ADVANCED_ANALYTICS, FeatureId::DATA_EXPORT]),
                quotas(20, 20, 10, 10),
            ),
            plan(
                "weekly",
                "Weekly",
                900,
                BillingPeriod::Weekly,
                BTreeSet::from([FeatureId::ADVANCED_ANALYTICS, FeatureId::DATA_EXPORT]),
                quotas(50, 50, 25, 25),
            ),
            plan(
                "monthly",
                "Monthly",
                2900,
                BillingPeriod::Monthly,
                BTreeSet::from([
                    FeatureId::ADVANCED_ANALYTICS,
                    FeatureId::DATA_EXPORT,
                    FeatureId::RECURRING_INVOICES,
                    FeatureId::TEAM_MANAGEMENT,
                ]),
                quotas(100, 200, 100, 100),
            ),
            plan(
                "yearly",
                "Yearly",
                29_000,
                BillingPeriod::Yearly,
                BTreeSet::from([
                    FeatureId::ADVANCED_ANALYTICS,
                    FeatureId::DATA_EXPORT,
                    FeatureId::MULTI_CURRENCY,
                    FeatureId::PRIORITY_SUPPORT,
                    FeatureId::RECURRING_INVOICES,
                    FeatureId::TEAM_MANAGEMENT,
                ]),
                BTreeMap::new(),
            ),
        ];
        let index = plans.iter().enumerate().map(|(i, plan)| (plan.id.clone(), i)).collect();

        Self { plans, index, trial_plan_id: PlanId("free-trial".to_owned()) }
    }

    /// Looks up a plan by id.
    ///
    /// # Errors
    ///
    /// Returns [`EntitlementError::UnknownPlan`] if the id is not in the catalog.
    pub fn get_plan(&self, plan_id: &PlanId) -> Result<&Plan> {
        self.index
            .get(plan_id)
            .map(|&i| &self.plans[i])
            .ok_or_else(|| EntitlementError::UnknownPlan(plan_id.to_string()))
    }

    /// All plans in catalog order.
    #[must_use]
    pub fn list_plans(&self) -> &[Plan] {
        &self.plans
    }

    /// The designated trial plan.
    #[must_use]
    pub fn trial_plan(&self) -> &Plan {
        &self.plans[self.index[&self.trial_plan_id]]
    }

    /// Id of the designated trial plan.
    #[must_use]
    pub fn trial_plan_id(&self) -> &PlanId {
        &self.trial_plan_id
    }

    /// Whether `plan_id` is the trial plan.
    #[must_use]
    pub fn is_trial_plan(&self, plan_id: &PlanId) -> bool {
        *plan_id == self.trial_plan_id
    }

    /// Paid plans in catalog order, as shown on the upgrade page.
    pub fn upgrade_offers(&self) -> impl Iterator<Item = &Plan> {
        self.plans.iter().filter(|plan| plan.id != self.trial_plan_id)
    }

    /// Every feature granted by at least one plan.
    #[must_use]
    pub fn features(&self) -> BTreeSet<&FeatureId> {
        self.plans.iter().flat_map(|plan| plan.features.iter()).collect()
    }
}
