//! Plan catalog: every plan the product sells, its features and its per-cycle quotas.
//!
//! The catalog is built once at startup, either from [`PlanCatalog::builtin`] or from a TOML
//! [`EngineConfig`], and shared read-only afterwards.

pub mod config;
pub mod models;
mod plans;

pub use config::{EngineConfig, EngineSettings, PlanConfig};
pub use models::{BillingPeriod, FeatureId, Plan, PlanId, ResourceType};
pub use plans::PlanCatalog;
