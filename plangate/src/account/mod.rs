//! Accounts: identity, persistence seam and the orchestrating service.
//!
//! The entitlement core in [`crate::subscriptions`] never touches storage. This module is the
//! caller that loads a [`SubscriptionState`](crate::subscriptions::SubscriptionState), runs it
//! through the core and saves the result.

mod service;
mod store;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use service::EntitlementService;
pub use store::{AccountStore, InMemoryAccountStore};

use crate::error::{EntitlementError, Result};

/// Identifier of a customer account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Creates an account id after validation.
    ///
    /// # Errors
    ///
    /// Returns [`EntitlementError::InvalidIdentifier`] if the id is empty, exceeds 64 characters,
    /// or contains characters other than alphanumerics, hyphens and underscores.
    pub fn new<S: Into<String>>(id: S) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(EntitlementError::InvalidIdentifier("account_id cannot be empty".into()));
        }
        if id.len() > 64 {
            return Err(EntitlementError::InvalidIdentifier(
                "account_id must be 64 characters or less".into(),
            ));
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(EntitlementError::InvalidIdentifier(
                "account_id must contain only alphanumeric characters, hyphens, and underscores"
                    .into(),
            ));
        }
        Ok(Self(id))
    }

    /// Returns the inner string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccountId {
    type Error = EntitlementError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
