//! Error types for the entitlement engine.
//!
//! All errors implement the standard [`std::error::Error`] trait via [`thiserror::Error`].
//!
//! # Error Categories
//!
//! - **Catalog Errors** ([`EntitlementError::UnknownPlan`],
//!   [`EntitlementError::CatalogConfigError`]): the plan catalog or its configuration is wrong
//! - **Misuse Errors** ([`EntitlementError::TransitionNotConfirmed`],
//!   [`EntitlementError::InvalidTransition`], [`EntitlementError::DuplicatePayment`]): a caller
//!   tried to change a subscription without a verified, unique payment
//! - **Validation Errors** ([`EntitlementError::InvalidPlanId`],
//!   [`EntitlementError::InvalidIdentifier`], [`EntitlementError::InvalidState`]): malformed input
//! - **Storage Errors** ([`EntitlementError::AccountNotFound`],
//!   [`EntitlementError::StorageError`]): the account-persistence collaborator failed
//!
//! Quota and feature denials are *not* errors. They are ordinary
//! [`GateDecision`](crate::subscriptions::GateDecision) values consumed by the UI.
//!
//! # Examples
//!
//! ```
//! use plangate::error::{EntitlementError, Result};
//!
//! fn require_paid(plan_id: &str) -> Result<()> {
//!     if plan_id == "free-trial" {
//!         return Err(EntitlementError::InvalidTransition("trial is not a paid plan".to_owned()));
//!     }
//!     Ok(())
//! }
//! # assert!(require_paid("monthly").is_ok());
//! ```

use thiserror::Error;

/// Result type alias for engine operations.
///
/// All fallible functions in this crate return this type.
pub type Result<T> = std::result::Result<T, EntitlementError>;

/// Errors that can occur in the entitlement engine.
///
/// # Error Recovery
///
/// - **Catalog errors** ([`UnknownPlan`](Self::UnknownPlan),
///   [`CatalogConfigError`](Self::CatalogConfigError)): fix the catalog or the stored plan id.
///   Never swallow these silently.
/// - **Misuse errors** ([`TransitionNotConfirmed`](Self::TransitionNotConfirmed),
///   [`InvalidTransition`](Self::InvalidTransition)): abort the triggering action and alert.
/// - **Storage errors** ([`StorageError`](Self::StorageError)): retry belongs to the storage
///   collaborator, not the engine.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum EntitlementError {
    /// The requested plan id is not present in the catalog.
    ///
    /// Indicates a data or configuration bug: a stored subscription references a plan that the
    /// running catalog does not know about, or an upgrade targeted a plan that was never offered.
    ///
    /// # Recovery
    ///
    /// Fail closed. Check that the catalog configuration deployed with this build contains the
    /// plan, and that no migration renamed it.
    ///
    /// # Examples
    ///
    /// ```
    /// use plangate::error::EntitlementError;
    ///
    /// let err = EntitlementError::UnknownPlan("enterprise".to_owned());
    /// assert_eq!(err.to_string(), "Unknown plan: enterprise");
    /// ```
    #[error("Unknown plan: {0}")]
    UnknownPlan(String),

    /// An upgrade was attempted without a verified payment confirmation.
    ///
    /// Raised when no confirmation is attached to the transition, when the confirmation was
    /// issued for a different plan, or when its payment reference is blank.
    ///
    /// # Recovery
    ///
    /// This is a programming error. Upgrades must only be reachable from the payment
    /// confirmation path.
    #[error("Upgrade not confirmed by payment: {0}")]
    TransitionNotConfirmed(String),

    /// The requested lifecycle transition is not allowed.
    ///
    /// For example, upgrading into the trial plan: no transition re-enters the trial.
    #[error("Invalid subscription transition: {0}")]
    InvalidTransition(String),

    /// A plan identifier failed validation.
    ///
    /// Plan ids must be 1-64 characters of ASCII letters, digits, hyphens and underscores.
    #[error("Invalid plan ID: {0}")]
    InvalidPlanId(String),

    /// A feature id or resource type failed validation.
    ///
    /// Feature ids and resource types must be 1-64 characters of lowercase ASCII letters,
    /// digits and underscores.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A subscription state violates one of its invariants.
    ///
    /// # Examples
    ///
    /// ```
    /// use plangate::error::EntitlementError;
    ///
    /// let err = EntitlementError::InvalidState("cycle_duration_days must be positive".to_owned());
    /// assert!(err.to_string().contains("Invalid subscription state"));
    /// ```
    #[error("Invalid subscription state: {0}")]
    InvalidState(String),

    /// The plan catalog or engine configuration is invalid.
    ///
    /// # Recovery
    ///
    /// Fix the TOML configuration. The message names the offending key.
    #[error("Catalog configuration error: {0}")]
    CatalogConfigError(String),

    /// The payment reference was already used for an upgrade.
    ///
    /// Payment confirmations are applied at most once.
    #[error("Payment already processed: {0}")]
    DuplicatePayment(String),

    /// The account-persistence collaborator has no state for this account.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// The account-persistence collaborator failed.
    #[error("Storage error: {0}")]
    StorageError(String),
}
