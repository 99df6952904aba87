//! Orchestration of load, evaluate/transition and save.

use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use lru::LruCache;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{AccountId, AccountStore};
use crate::{
    catalog::{EngineSettings, FeatureId, Plan, PlanCatalog, ResourceType},
    clock::{Clock, SystemClock},
    error::{EntitlementError, Result},
    security::audit::{AuditEvent, AuditEventType, audit_log},
    subscriptions::{
        EntitlementView, GateDecision, PaymentConfirmation, SubscriptionState, UpgradeOutcome,
        UpgradeTransition, check, check_feature, evaluate,
    },
};

/// Entitlement operations over stored accounts.
///
/// Wraps the pure core with persistence, an injected clock, payment replay protection and
/// audit logging. Each payment reference is applied at most once for as long as it stays in the
/// replay cache (`payment_replay_capacity` most recent references).
///
/// Read-modify-write operations ([`record_created`](Self::record_created),
/// [`confirm_payment`](Self::confirm_payment)) are not serialized per account. Hosts running
/// several writers for one account need a store that rejects stale writes.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use plangate::{
///     account::{AccountId, EntitlementService, InMemoryAccountStore},
///     catalog::{EngineSettings, PlanCatalog, ResourceType},
///     clock::SystemClock,
/// };
///
/// # async fn example() -> plangate::error::Result<()> {
/// let service = EntitlementService::new(
///     Arc::new(PlanCatalog::builtin()),
///     EngineSettings::default(),
///     InMemoryAccountStore::new(),
///     SystemClock,
/// );
///
/// let account = AccountId::new("acct-1")?;
/// let view = service.start_trial(&account).await?;
/// assert!(view.is_trial());
///
/// let decision = service.authorize_create(&account, &ResourceType::INVOICE).await?;
/// assert!(decision.is_allowed());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct EntitlementService<S, C = SystemClock> {
    catalog: Arc<PlanCatalog>,
    settings: EngineSettings,
    store: S,
    clock: C,
    processed_payments: Mutex<LruCache<String, DateTime<Utc>>>,
}

impl<S: AccountStore, C: Clock> EntitlementService<S, C> {
    /// Creates a service.
    #[must_use]
    pub fn new(catalog: Arc<PlanCatalog>, settings: EngineSettings, store: S, clock: C) -> Self {
        let capacity =
            NonZeroUsize::new(settings.payment_replay_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            catalog,
            settings,
            store,
            clock,
            processed_payments: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The plan catalog.
    #[must_use]
    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    /// Engine settings.
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// All plans in catalog order.
    #[must_use]
    pub fn list_plans(&self) -> &[Plan] {
        self.catalog.list_plans()
    }

    /// Puts a new account on the trial plan, starting now.
    ///
    /// # Errors
    ///
    /// - [`EntitlementError::InvalidTransition`] if the account already exists
    /// - [`EntitlementError::StorageError`] if the store fails
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn start_trial(&self, account_id: &AccountId) -> Result<EntitlementView> {
        match self.store.load(account_id).await {
            Ok(_) => {
                return Err(EntitlementError::InvalidTransition(format!(
                    "account {account_id} already has a subscription"
                )));
            }
            Err(EntitlementError::AccountNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let now = self.clock.now();
        let state = SubscriptionState::start_trial(&self.catalog, now);
        let view = evaluate(&self.catalog, &state, now)?;
        self.store.save(account_id, state).await?;

        audit_log(
            &AuditEvent::new(AuditEventType::TrialStarted, account_id, Uuid::new_v4(), now)
                .with_plan(&view.plan_id),
        );
        info!(remaining_days = view.remaining_days, "trial started");
        Ok(view)
    }

    /// Current entitlements of an account.
    ///
    /// # Errors
    ///
    /// - [`EntitlementError::AccountNotFound`] for unknown accounts
    /// - [`EntitlementError::UnknownPlan`] if the stored plan is not in the catalog
    /// - [`EntitlementError::InvalidState`] if the stored state breaks its invariants
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn entitlements(&self, account_id: &AccountId) -> Result<EntitlementView> {
        let state = self.load_state(account_id).await?;
        evaluate(&self.catalog, &state, self.clock.now())
    }

    /// Remaining days when the account is close enough to expiry to warn about it.
    ///
    /// `None` when expired or further away than `expiry_warning_days`.
    ///
    /// # Errors
    ///
    /// Same as [`entitlements`](Self::entitlements).
    pub async fn expiry_warning(&self, account_id: &AccountId) -> Result<Option<u32>> {
        let view = self.entitlements(account_id).await?;
        Ok(view
            .is_expiring_within(self.settings.expiry_warning_days)
            .then_some(view.remaining_days))
    }

    /// Decides whether the account may create one more `resource` record.
    ///
    /// # Errors
    ///
    /// Same as [`entitlements`](Self::entitlements).
    #[instrument(skip(self), fields(account_id = %account_id, resource = %resource))]
    pub async fn authorize_create(
        &self,
        account_id: &AccountId,
        resource: &ResourceType,
    ) -> Result<GateDecision> {
        let now = self.clock.now();
        let view = self.entitlements(account_id).await?;
        let decision = check(&view, resource);
        if let Some(reason) = decision.deny_reason() {
            warn!(?reason, "record creation denied");
            audit_log(
                &AuditEvent::new(AuditEventType::QuotaDenied, account_id, Uuid::new_v4(), now)
                    .with_plan(&view.plan_id)
                    .with_resource(resource),
            );
        }
        Ok(decision)
    }

    /// Decides whether the account may use `feature`.
    ///
    /// # Errors
    ///
    /// Same as [`entitlements`](Self::entitlements).
    #[instrument(skip(self), fields(account_id = %account_id, feature = %feature))]
    pub async fn authorize_feature(
        &self,
        account_id: &AccountId,
        feature: &FeatureId,
    ) -> Result<GateDecision> {
        let now = self.clock.now();
        let view = self.entitlements(account_id).await?;
        let decision = check_feature(&view, feature);
        if let Some(reason) = decision.deny_reason() {
            warn!(?reason, "feature use denied");
            audit_log(
                &AuditEvent::new(AuditEventType::FeatureDenied, account_id, Uuid::new_v4(), now)
                    .with_plan(&view.plan_id)
                    .with_feature(feature),
            );
        }
        Ok(decision)
    }

    /// Counts one created `resource` record against the account's quota.
    ///
    /// Call after the record-creation collaborator stored the record. Returns the refreshed
    /// entitlements.
    ///
    /// # Errors
    ///
    /// Same as [`entitlements`](Self::entitlements), plus [`EntitlementError::StorageError`] if
    /// saving fails.
    #[instrument(skip(self), fields(account_id = %account_id, resource = %resource))]
    pub async fn record_created(
        &self,
        account_id: &AccountId,
        resource: &ResourceType,
    ) -> Result<EntitlementView> {
        let state = self.load_state(account_id).await?.record_usage(resource);
        let view = evaluate(&self.catalog, &state, self.clock.now())?;
        self.store.save(account_id, state).await?;
        Ok(view)
    }

    /// Applies a confirmed payment: upgrades the account and persists the new state.
    ///
    /// # Errors
    ///
    /// - [`EntitlementError::DuplicatePayment`] if the payment reference was already applied
    /// - any error of [`UpgradeTransition::apply`]
    /// - [`EntitlementError::AccountNotFound`] or [`EntitlementError::StorageError`] from the
    ///   store
    ///
    /// A payment that fails for any reason other than being a duplicate can be retried.
    #[instrument(
        skip(self, confirmation),
        fields(account_id = %confirmation.account_id(), plan_id = %confirmation.plan_id())
    )]
    pub async fn confirm_payment(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<UpgradeOutcome> {
        let account_id = confirmation.account_id();
        let request_id = Uuid::new_v4();
        let now = self.clock.now();

        if let Err(e) = self.reserve_payment(confirmation.payment_ref(), now) {
            warn!(error = %e, "duplicate payment rejected");
            audit_log(
                &AuditEvent::new(
                    AuditEventType::DuplicatePaymentRejected,
                    account_id,
                    request_id,
                    now,
                )
                .with_plan(confirmation.plan_id())
                .with_payment_ref(confirmation.payment_ref()),
            );
            return Err(e);
        }

        match self.upgrade(confirmation, now).await {
            Ok(outcome) => {
                audit_log(
                    &AuditEvent::new(AuditEventType::UpgradeApplied, account_id, request_id, now)
                        .with_plan(&outcome.state.plan_id)
                        .with_previous_plan(&outcome.previous_plan_id)
                        .with_payment_ref(&outcome.payment_ref)
                        .with_bonus_days(outcome.bonus_days),
                );
                info!(
                    bonus_days = outcome.bonus_days,
                    cycle_duration_days = outcome.state.cycle_duration_days,
                    "upgrade applied"
                );
                Ok(outcome)
            }
            Err(e) => {
                self.release_payment(confirmation.payment_ref());
                warn!(error = %e, "upgrade rejected");
                audit_log(
                    &AuditEvent::new(AuditEventType::UpgradeRejected, account_id, request_id, now)
                        .with_plan(confirmation.plan_id())
                        .with_payment_ref(confirmation.payment_ref())
                        .with_error(e.to_string()),
                );
                Err(e)
            }
        }
    }

    async fn upgrade(
        &self,
        confirmation: &PaymentConfirmation,
        now: DateTime<Utc>,
    ) -> Result<UpgradeOutcome> {
        let account_id = confirmation.account_id();
        let state = self.load_state(account_id).await?;
        let outcome = UpgradeTransition::new(&self.catalog).confirmed_by(confirmation).apply(
            &state,
            confirmation.plan_id(),
            now,
        )?;
        self.store.save(account_id, outcome.state.clone()).await?;
        Ok(outcome)
    }

    /// Loads a state written by the host store and checks it against the catalog.
    async fn load_state(&self, account_id: &AccountId) -> Result<SubscriptionState> {
        let state = self.store.load(account_id).await?;
        state.validate(&self.catalog)?;
        Ok(state)
    }

    fn reserve_payment(&self, payment_ref: &str, now: DateTime<Utc>) -> Result<()> {
        let mut processed = self.processed_payments.lock().map_err(|_| {
            EntitlementError::StorageError("payment replay cache lock poisoned".to_owned())
        })?;
        if processed.contains(payment_ref) {
            return Err(EntitlementError::DuplicatePayment(payment_ref.to_owned()));
        }
        processed.put(payment_ref.to_owned(), now);
        Ok(())
    }

    fn release_payment(&self, payment_ref: &str) {
        if let Ok(mut processed) = self.processed_payments.lock() {
            processed.pop(payment_ref);
        }
    }
}
