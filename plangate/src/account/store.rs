//! Account persistence seam.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::AccountId;
use crate::{
    error::{EntitlementError, Result},
    subscriptions::SubscriptionState,
};

/// Persistence of one [`SubscriptionState`] per account.
///
/// Implemented by the host application over its database. Implementations own retries; the
/// engine reports their failures as [`EntitlementError::StorageError`].
pub trait AccountStore: Send + Sync {
    /// Loads the state of `account_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EntitlementError::AccountNotFound`] for unknown accounts, or
    /// [`EntitlementError::StorageError`] if the backend fails.
    fn load<'a>(
        &'a self,
        account_id: &'a AccountId,
    ) -> impl Future<Output = Result<SubscriptionState>> + Send + 'a;

    /// Stores `state` as the current state of `account_id`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`EntitlementError::StorageError`] if the backend fails.
    fn save<'a>(
        &'a self,
        account_id: &'a AccountId,
        state: SubscriptionState,
    ) -> impl Future<Output = Result<()>> + Send + 'a;
}

/// Process-local store for tests, demos and single-node tools.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<AccountId, SubscriptionState>>,
}

impl InMemoryAccountStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    /// Whether the store holds no accounts.
    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

impl AccountStore for InMemoryAccountStore {
    fn load<'a>(
        &'a self,
        account_id: &'a AccountId,
    ) -> impl Future<Output = Result<SubscriptionState>> + Send + 'a {
        async move {
            self.accounts
                .read()
                .await
                .get(account_id)
                .cloned()
                .ok_or_else(|| EntitlementError::AccountNotFound(account_id.to_string()))
        }
    }

    fn save<'a>(
        &'a self,
        account_id: &'a AccountId,
        state: SubscriptionState,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        async move {
            self.accounts.write().await.insert(account_id.clone(), state);
            Ok(())
        }
    }
}
