//! Subscription lifecycle and entitlements.
//!
//! The flow a page goes through:
//!
//! 1. [`evaluate`] the stored [`SubscriptionState`] at `now` to get an [`EntitlementView`]
//! 2. render badges and locked/unlocked branches from the view
//! 3. [`check`] a resource or [`check_feature`] a feature before acting on it
//! 4. on a confirmed payment, [`UpgradeTransition::apply`] produces the next state to persist
//!
//! Everything here is synchronous and side-effect free apart from `tracing` output.

mod entitlement;
mod gate;
mod state;
mod upgrade;

#[cfg(test)]
mod tests;

pub use entitlement::{EntitlementView, ResourceAccess, evaluate};
pub use gate::{DenyReason, GateDecision, check, check_feature};
pub use state::{SubscriptionState, SubscriptionStatus};
pub use upgrade::{PaymentConfirmation, UpgradeOutcome, UpgradeTransition};
