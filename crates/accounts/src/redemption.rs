//! License redemption: validate a key, store the license record, and move
//! the account to the granted tier.

use chrono::Utc;
use growth_core::types::LicenseRecord;
use growth_core::{Collection, UserAccount};
use growth_licensing::{LicenseError, LicenseValidator};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{require_account, AccountStore, RedeemError};

#[derive(Debug, Clone)]
pub struct Redemption {
    pub record: LicenseRecord,
    pub account: UserAccount,
}

/// Redeem `license_key` for `uid`. A failed validation stores nothing and
/// leaves the tier unchanged. If the tier update fails the stored license
/// record is removed again before the error is returned.
pub async fn redeem_license(
    store: &dyn AccountStore,
    validator: &LicenseValidator,
    uid: &str,
    license_key: &str,
) -> Result<Redemption, RedeemError> {
    require_account(store, uid).await?;

    let validation = validator.validate(license_key).await;
    let license = match (validation.valid, validation.license) {
        (true, Some(license)) => license,
        _ => {
            let failure = validation.failure.unwrap_or_else(|| {
                LicenseError::Malformed("validation returned no license".to_string())
            });
            warn!(uid, error = %failure, "License redemption failed");
            return Err(failure.into());
        }
    };

    let now = Utc::now();
    let record = LicenseRecord {
        id: Uuid::new_v4(),
        owner_id: uid.to_string(),
        license_key: license.license_key,
        product_id: license.product_id,
        tier: validation.tier,
        valid: true,
        expires_at: license.expires_at,
        created_at: now,
        updated_at: now,
    };
    store.insert_record(record.clone().into()).await?;
    let account = match store.update_tier(uid, validation.tier).await {
        Ok(account) => account,
        Err(e) => {
            warn!(uid, error = %e, "Tier update failed, removing license record");
            if let Err(cleanup) = store.delete_record(Collection::Licenses, record.id).await {
                error!(uid, record_id = %record.id, error = %cleanup, "License record cleanup failed");
            }
            return Err(e.into());
        }
    };
    info!(uid, tier = %validation.tier, license_id = %license.id, "License redeemed");

    Ok(Redemption { record, account })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, StoreError};
    use async_trait::async_trait;
    use crate::ProfileUpdate;
    use growth_core::{Record, Tier};
    use growth_licensing::{LicensePayload, LicenseService, ValidationEnvelope};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedService(Option<LicensePayload>);

    #[async_trait]
    impl LicenseService for FixedService {
        async fn validate_key(
            &self,
            license_key: &str,
            _product_id: &str,
        ) -> Result<ValidationEnvelope, LicenseError> {
            Ok(ValidationEnvelope {
                success: self.0.is_some(),
                license: self.0.clone().map(|mut l| {
                    l.license_key = license_key.to_string();
                    l
                }),
                message: None,
            })
        }
    }

    fn validator(tier: Option<&str>) -> LicenseValidator {
        let payload = tier.map(|t| LicensePayload {
            id: "lic_9".into(),
            product_id: "growth-dashboard".into(),
            license_key: String::new(),
            created_at: Utc::now(),
            expires_at: None,
            custom_fields: Some(json!({ "tier": t })),
            metadata: None,
        });
        LicenseValidator::new(
            Arc::new(FixedService(payload)),
            "growth-dashboard",
            Duration::from_secs(1),
        )
    }

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create_account(UserAccount::new("u1", "u1@example.com"))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_redeem_upgrades_tier() {
        let store = store().await;
        let redemption = redeem_license(&store, &validator(Some("coach")), "u1", "KEY-1")
            .await
            .unwrap();

        assert_eq!(redemption.account.tier(), Some(Tier::Coach));
        assert_eq!(redemption.record.license_key, "KEY-1");
        assert!(redemption.record.is_active());
        assert_eq!(store.count_records(Collection::Licenses, "u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rejected_key_changes_nothing() {
        let store = store().await;
        let err = redeem_license(&store, &validator(None), "u1", "BAD")
            .await
            .unwrap_err();
        assert!(matches!(err, RedeemError::License(LicenseError::Rejected(_))));

        let account = store.get_account("u1").await.unwrap().unwrap();
        assert_eq!(account.tier(), Some(Tier::Starter));
        assert_eq!(store.count_records(Collection::Licenses, "u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_redeem_for_missing_account() {
        let store = MemoryStore::new();
        let err = redeem_license(&store, &validator(Some("coach")), "ghost", "KEY")
            .await
            .unwrap_err();
        assert!(matches!(err, RedeemError::Store(StoreError::AccountNotFound(_))));
    }

    /// Delegates to a [`MemoryStore`] but refuses every tier update.
    struct TierWriteFails(MemoryStore);

    #[async_trait]
    impl AccountStore for TierWriteFails {
        async fn create_account(&self, account: UserAccount) -> Result<UserAccount, StoreError> {
            self.0.create_account(account).await
        }

        async fn get_account(&self, uid: &str) -> Result<Option<UserAccount>, StoreError> {
            self.0.get_account(uid).await
        }

        async fn list_accounts(&self) -> Result<Vec<UserAccount>, StoreError> {
            self.0.list_accounts().await
        }

        async fn update_profile(
            &self,
            uid: &str,
            update: ProfileUpdate,
        ) -> Result<UserAccount, StoreError> {
            self.0.update_profile(uid, update).await
        }

        async fn record_login(&self, uid: &str) -> Result<UserAccount, StoreError> {
            self.0.record_login(uid).await
        }

        async fn update_tier(&self, _uid: &str, _tier: Tier) -> Result<UserAccount, StoreError> {
            Err(StoreError::Unavailable("accounts".into()))
        }

        async fn delete_account(&self, uid: &str) -> Result<bool, StoreError> {
            self.0.delete_account(uid).await
        }

        async fn insert_record(&self, record: Record) -> Result<(), StoreError> {
            self.0.insert_record(record).await
        }

        async fn get_record(
            &self,
            collection: Collection,
            id: Uuid,
        ) -> Result<Option<Record>, StoreError> {
            self.0.get_record(collection, id).await
        }

        async fn update_record(&self, record: Record) -> Result<(), StoreError> {
            self.0.update_record(record).await
        }

        async fn list_records(
            &self,
            collection: Collection,
            owner_id: &str,
        ) -> Result<Vec<Record>, StoreError> {
            self.0.list_records(collection, owner_id).await
        }

        async fn count_records(&self, collection: Collection, owner_id: &str) -> Result<u64, StoreError> {
            self.0.count_records(collection, owner_id).await
        }

        async fn delete_record(&self, collection: Collection, id: Uuid) -> Result<bool, StoreError> {
            self.0.delete_record(collection, id).await
        }

        async fn delete_owned(&self, collection: Collection, owner_id: &str) -> Result<u64, StoreError> {
            self.0.delete_owned(collection, owner_id).await
        }
    }

    #[tokio::test]
    async fn test_failed_tier_update_removes_license_record() {
        let store = TierWriteFails(store().await);
        let err = redeem_license(&store, &validator(Some("coach")), "u1", "KEY-2")
            .await
            .unwrap_err();
        assert!(matches!(err, RedeemError::Store(StoreError::Unavailable(_))));

        assert_eq!(store.count_records(Collection::Licenses, "u1").await.unwrap(), 0);
        let account = store.get_account("u1").await.unwrap().unwrap();
        assert_eq!(account.tier(), Some(Tier::Starter));
    }
}
