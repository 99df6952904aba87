//! plangate: Subscription Lifecycle & Feature Entitlement Engine
//!
//! One place that answers, for a small-business SaaS account, "which features are unlocked",
//! "how many days of access are left" and "may this user create another invoice". Pages stop
//! re-deriving trial and expiry flags and branch on a single [`EntitlementView`] instead.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  EntitlementService (account)                            │
//! │  load ─► evaluate / apply ─► save, replay guard, audit   │
//! └────────┬─────────────────────────────────────┬───────────┘
//!          │                                     │
//! ┌────────▼─────────────────────────┐  ┌────────▼─────────┐
//! │  subscriptions (pure)            │  │  AccountStore    │
//! │  evaluate · check · check_feature│  │  (host database) │
//! │  UpgradeTransition::apply        │  └──────────────────┘
//! └────────┬─────────────────────────┘
//!          │
//! ┌────────▼─────────┐
//! │  PlanCatalog     │  builtin or TOML EngineConfig
//! └──────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## 1. Evaluate a Stored Subscription
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use plangate::{
//!     catalog::{FeatureId, PlanCatalog, ResourceType},
//!     subscriptions::{SubscriptionState, check, check_feature, evaluate},
//! };
//!
//! # fn example() -> plangate::Result<()> {
//! let catalog = PlanCatalog::builtin();
//! let now = Utc::now();
//! let state = SubscriptionState::start_trial(&catalog, now - Duration::days(2));
//!
//! let view = evaluate(&catalog, &state, now)?;
//! assert_eq!(view.remaining_days, 5);
//! assert!(check(&view, &ResourceType::INVOICE).is_allowed());
//! assert!(!check_feature(&view, &FeatureId::TEAM_MANAGEMENT).is_allowed());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## 2. Upgrade on a Confirmed Payment
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use plangate::{
//!     account::AccountId,
//!     catalog::{PlanCatalog, PlanId},
//!     subscriptions::{PaymentConfirmation, SubscriptionState, SubscriptionStatus, UpgradeTransition},
//! };
//!
//! # fn example() -> plangate::Result<()> {
//! let catalog = PlanCatalog::builtin();
//! let now = Utc::now();
//! let trial = SubscriptionState::start_trial(&catalog, now - Duration::days(4));
//!
//! let monthly = PlanId::new("monthly")?;
//! let payment = PaymentConfirmation::new(AccountId::new("acct-1")?, monthly.clone(), "pay_1", now)?;
//! let outcome = UpgradeTransition::new(&catalog).confirmed_by(&payment).apply(&trial, &monthly, now)?;
//!
//! assert_eq!(outcome.state.status, SubscriptionStatus::Active);
//! assert_eq!(outcome.state.cycle_duration_days, 33);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## 3. Load the Catalog from Configuration
//!
//! ```rust
//! use plangate::catalog::EngineConfig;
//!
//! # fn example() -> plangate::Result<()> {
//! let (catalog, settings) = EngineConfig::from_toml(
//!     r#"
//!     trial_plan = "trial"
//!
//!     [[plans]]
//!     id = "trial"
//!     name = "Trial"
//!     billing_period = "trial"
//!
//!     [[plans]]
//!     id = "pro"
//!     name = "Pro"
//!     price_minor_units = 1500
//!     billing_period = "monthly"
//!     "#,
//! )?
//! .into_catalog()?;
//!
//! assert_eq!(catalog.list_plans().len(), 2);
//! assert_eq!(settings.expiry_warning_days, 3);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Modules
//!
//! - [`catalog`]: plans, identifiers and TOML configuration
//! - [`subscriptions`]: state, evaluation, upgrades and gating
//! - [`account`]: account ids, the storage seam and [`EntitlementService`]
//! - [`clock`]: injected time
//! - [`security`]: audit logging
//! - [`error`]: the error type
//!
//! # Logging
//!
//! The crate logs through `tracing` and installs no subscriber. Audit events use the
//! `audit` target.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod account;
pub mod catalog;
pub mod clock;
pub mod error;
pub mod security;
pub mod subscriptions;

pub use account::EntitlementService;
pub use error::{EntitlementError, Result};
pub use subscriptions::EntitlementView;
