//! Per-session entitlement state.
//!
//! The session is a snapshot of the account taken at [`EntitlementSession::load`].
//! It goes stale as soon as the tier changes elsewhere; call
//! [`EntitlementSession::refresh`] after any mutation.

use chrono::{DateTime, Utc};
use growth_core::{Tier, UserAccount};
use growth_licensing::{EntitlementGuard, Feature, Limit, Resource};
use tracing::debug;

use crate::{require_account, AccountStore, StoreError};

#[derive(Debug, Clone)]
pub struct EntitlementSession {
    account: UserAccount,
    guard: EntitlementGuard,
    loaded_at: DateTime<Utc>,
}

impl EntitlementSession {
    pub async fn load(store: &dyn AccountStore, uid: &str) -> Result<Self, StoreError> {
        let account = require_account(store, uid).await?;
        let guard = EntitlementGuard::resolve(&account.tier);
        debug!(uid, tier = %account.tier, "Entitlement session loaded");
        Ok(Self {
            account,
            guard,
            loaded_at: Utc::now(),
        })
    }

    /// Re-read the account and replace the snapshot.
    pub async fn refresh(&mut self, store: &dyn AccountStore) -> Result<(), StoreError> {
        *self = Self::load(store, &self.account.uid).await?;
        Ok(())
    }

    pub fn account(&self) -> &UserAccount {
        &self.account
    }

    /// `None` when the stored tier is unrecognized.
    pub fn tier(&self) -> Option<Tier> {
        self.guard.tier()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn can_use(&self, feature: Feature) -> bool {
        self.guard.allows(feature)
    }

    pub fn limit(&self, resource: Resource) -> Limit {
        self.guard.limit(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[tokio::test]
    async fn test_session_is_a_snapshot_until_refreshed() {
        let store = MemoryStore::new();
        store
            .create_account(UserAccount::new("u1", "u1@example.com"))
            .await
            .unwrap();

        let mut session = EntitlementSession::load(&store, "u1").await.unwrap();
        let first_load = session.loaded_at();
        assert_eq!(session.tier(), Some(Tier::Starter));
        assert!(!session.can_use(Feature::Export));

        store.update_tier("u1", Tier::Coach).await.unwrap();
        assert_eq!(session.tier(), Some(Tier::Starter));

        session.refresh(&store).await.unwrap();
        assert!(session.loaded_at() >= first_load);
        assert_eq!(session.tier(), Some(Tier::Coach));
        assert!(session.can_use(Feature::Export));
        assert_eq!(session.limit(Resource::Habits), Limit::Unlimited);
    }

    #[tokio::test]
    async fn test_session_for_deleted_account_fails() {
        let store = MemoryStore::new();
        store
            .create_account(UserAccount::new("u1", "u1@example.com"))
            .await
            .unwrap();
        let mut session = EntitlementSession::load(&store, "u1").await.unwrap();
        store.delete_account("u1").await.unwrap();

        let err = session.refresh(&store).await.unwrap_err();
        assert!(matches!(err, StoreError::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_corrupted_tier_grants_nothing() {
        let store = MemoryStore::new();
        let mut account = UserAccount::new("u1", "u1@example.com");
        account.tier = "Business".into();
        store.create_account(account).await.unwrap();

        let session = EntitlementSession::load(&store, "u1").await.unwrap();
        assert_eq!(session.tier(), None);
        assert!(!session.can_use(Feature::Admin));
        assert_eq!(session.limit(Resource::Tasks), Limit::Capped(0));
    }
}
