//! In-memory account store backed by DashMap.
//!
//! Nothing is persisted implicitly. [`MemoryStore::save_snapshot`] writes the
//! whole store to a JSON file and [`MemoryStore::open`] reads it back.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use growth_core::{Collection, Record, Tier, UserAccount};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{AccountStore, ProfileUpdate, StoreError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    accounts: Vec<UserAccount>,
    records: Vec<Record>,
}

pub struct MemoryStore {
    accounts: DashMap<String, UserAccount>,
    collections: HashMap<Collection, DashMap<Uuid, Record>>,
    faults: RwLock<HashSet<Collection>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            collections: Collection::ALL
                .iter()
                .map(|c| (*c, DashMap::new()))
                .collect(),
            faults: RwLock::new(HashSet::new()),
        }
    }

    /// Load a snapshot, or start empty when `path` does not exist.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path = %path.display(), "No snapshot found, starting empty");
            return Ok(Self::new());
        }
        Self::load_snapshot(path)
    }

    /// Load a snapshot written by [`MemoryStore::save_snapshot`].
    pub fn load_snapshot(path: &Path) -> Result<Self, StoreError> {
        let contents = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        let store = Self::new();
        for account in snapshot.accounts {
            store.accounts.insert(account.uid.clone(), account);
        }
        for record in snapshot.records {
            store.table(record.collection()).insert(record.id(), record);
        }
        info!(
            path = %path.display(),
            accounts = store.accounts.len(),
            "Snapshot loaded"
        );
        Ok(store)
    }

    /// Write the full store to `path`. The file is replaced atomically.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        let mut accounts: Vec<UserAccount> =
            self.accounts.iter().map(|e| e.value().clone()).collect();
        accounts.sort_by(|a, b| a.uid.cmp(&b.uid));

        let mut records = Vec::new();
        for collection in Collection::ALL {
            let mut rows: Vec<Record> = self
                .table(*collection)
                .iter()
                .map(|e| e.value().clone())
                .collect();
            rows.sort_by_key(Record::id);
            records.extend(rows);
        }

        let json = serde_json::to_vec_pretty(&Snapshot { accounts, records })?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        info!(path = %path.display(), "Snapshot saved");
        Ok(())
    }

    /// Make every operation on `collection` fail until [`MemoryStore::restore`].
    pub fn inject_fault(&self, collection: Collection) {
        self.faults.write().insert(collection);
    }

    pub fn restore(&self, collection: Collection) {
        self.faults.write().remove(&collection);
    }

    fn check(&self, collection: Collection) -> Result<(), StoreError> {
        if self.faults.read().contains(&collection) {
            return Err(StoreError::Unavailable(format!(
                "{collection} collection is unavailable"
            )));
        }
        Ok(())
    }

    fn table(&self, collection: Collection) -> &DashMap<Uuid, Record> {
        // Every collection is inserted in `new`.
        &self.collections[&collection]
    }

    fn mutate_account(
        &self,
        uid: &str,
        f: impl FnOnce(&mut UserAccount),
    ) -> Result<UserAccount, StoreError> {
        let mut entry = self
            .accounts
            .get_mut(uid)
            .ok_or_else(|| StoreError::AccountNotFound(uid.to_string()))?;
        f(&mut entry);
        Ok(entry.clone())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create_account(&self, account: UserAccount) -> Result<UserAccount, StoreError> {
        use dashmap::mapref::entry::Entry;
        match self.accounts.entry(account.uid.clone()) {
            Entry::Occupied(_) => Err(StoreError::AccountExists(account.uid)),
            Entry::Vacant(slot) => {
                info!(uid = %account.uid, "Account created");
                slot.insert(account.clone());
                Ok(account)
            }
        }
    }

    async fn get_account(&self, uid: &str) -> Result<Option<UserAccount>, StoreError> {
        Ok(self.accounts.get(uid).map(|e| e.value().clone()))
    }

    async fn list_accounts(&self) -> Result<Vec<UserAccount>, StoreError> {
        Ok(self.accounts.iter().map(|e| e.value().clone()).collect())
    }

    async fn update_profile(
        &self,
        uid: &str,
        update: ProfileUpdate,
    ) -> Result<UserAccount, StoreError> {
        self.mutate_account(uid, |account| {
            if let Some(email) = update.email {
                account.email = email;
            }
            if let Some(name) = update.display_name {
                account.display_name = Some(name);
            }
            account.updated_at = Utc::now();
        })
    }

    async fn record_login(&self, uid: &str) -> Result<UserAccount, StoreError> {
        self.mutate_account(uid, |account| account.last_login_at = Some(Utc::now()))
    }

    async fn update_tier(&self, uid: &str, tier: Tier) -> Result<UserAccount, StoreError> {
        self.mutate_account(uid, |account| {
            account.tier = tier.as_str().to_string();
            account.updated_at = Utc::now();
        })
    }

    async fn delete_account(&self, uid: &str) -> Result<bool, StoreError> {
        Ok(self.accounts.remove(uid).is_some())
    }

    async fn insert_record(&self, record: Record) -> Result<(), StoreError> {
        let collection = record.collection();
        self.check(collection)?;
        self.table(collection).insert(record.id(), record);
        Ok(())
    }

    async fn get_record(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<Record>, StoreError> {
        self.check(collection)?;
        Ok(self.table(collection).get(&id).map(|e| e.value().clone()))
    }

    async fn update_record(&self, record: Record) -> Result<(), StoreError> {
        let collection = record.collection();
        self.check(collection)?;
        let mut entry = self
            .table(collection)
            .get_mut(&record.id())
            .ok_or(StoreError::RecordNotFound {
                collection,
                id: record.id(),
            })?;
        *entry = record;
        Ok(())
    }

    async fn list_records(
        &self,
        collection: Collection,
        owner_id: &str,
    ) -> Result<Vec<Record>, StoreError> {
        self.check(collection)?;
        Ok(self
            .table(collection)
            .iter()
            .filter(|e| e.value().owner_id() == owner_id)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn count_records(&self, collection: Collection, owner_id: &str) -> Result<u64, StoreError> {
        self.check(collection)?;
        let count = self
            .table(collection)
            .iter()
            .filter(|e| e.value().owner_id() == owner_id)
            .count();
        Ok(count as u64)
    }

    async fn delete_record(&self, collection: Collection, id: Uuid) -> Result<bool, StoreError> {
        self.check(collection)?;
        Ok(self.table(collection).remove(&id).is_some())
    }

    async fn delete_owned(&self, collection: Collection, owner_id: &str) -> Result<u64, StoreError> {
        self.check(collection)?;
        let table = self.table(collection);
        let ids: Vec<Uuid> = table
            .iter()
            .filter(|e| e.value().owner_id() == owner_id)
            .map(|e| *e.key())
            .collect();
        let removed = ids.iter().filter(|id| table.remove(id).is_some()).count() as u64;
        debug!(%collection, owner_id, removed, "Owned records deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use growth_core::types::{Habit, HabitFrequency, Task};

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create_account(UserAccount::new("u1", "u1@example.com"))
            .await
            .unwrap();
        store
            .insert_record(Habit::new("u1", "Meditate", HabitFrequency::Daily).into())
            .await
            .unwrap();
        store.insert_record(Task::new("u1", "Plan week").into()).await.unwrap();
        store.insert_record(Task::new("u2", "Other").into()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_create_account_rejects_duplicate() {
        let store = seeded().await;
        let err = store
            .create_account(UserAccount::new("u1", "dup@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AccountExists(uid) if uid == "u1"));
    }

    #[tokio::test]
    async fn test_update_tier_touches_only_tier() {
        let store = seeded().await;
        let before = store.get_account("u1").await.unwrap().unwrap();
        let after = store.update_tier("u1", Tier::Business).await.unwrap();

        assert_eq!(after.tier, "business");
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(after.email, before.email);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(store.count_records(Collection::Tasks, "u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_account() {
        let store = MemoryStore::new();
        let err = store.update_tier("ghost", Tier::Coach).await.unwrap_err();
        assert!(matches!(err, StoreError::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_profile_and_login() {
        let store = seeded().await;
        let updated = store
            .update_profile(
                "u1",
                ProfileUpdate {
                    display_name: Some("Una".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Una"));
        assert_eq!(updated.email, "u1@example.com");

        let logged_in = store.record_login("u1").await.unwrap();
        assert!(logged_in.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_owner_scoped_queries() {
        let store = seeded().await;
        assert_eq!(store.count_records(Collection::Tasks, "u1").await.unwrap(), 1);
        assert_eq!(store.count_records(Collection::Tasks, "u2").await.unwrap(), 1);
        assert_eq!(store.count_records(Collection::Reviews, "u1").await.unwrap(), 0);

        let habits = store.list_records(Collection::Habits, "u1").await.unwrap();
        assert_eq!(habits.len(), 1);
        assert_eq!(habits[0].owner_id(), "u1");
    }

    #[tokio::test]
    async fn test_delete_owned_is_idempotent() {
        let store = seeded().await;
        assert_eq!(store.delete_owned(Collection::Tasks, "u1").await.unwrap(), 1);
        assert_eq!(store.delete_owned(Collection::Tasks, "u1").await.unwrap(), 0);
        // Other owners are untouched.
        assert_eq!(store.count_records(Collection::Tasks, "u2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = MemoryStore::new();
        let err = store
            .update_record(Task::new("u1", "never stored").into())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound { collection: Collection::Tasks, .. }));
    }

    #[tokio::test]
    async fn test_injected_fault() {
        let store = seeded().await;
        store.inject_fault(Collection::Habits);
        let err = store.delete_owned(Collection::Habits, "u1").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.count_records(Collection::Tasks, "u1").await.unwrap(), 1);

        store.restore(Collection::Habits);
        assert_eq!(store.delete_owned(Collection::Habits, "u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let store = seeded().await;
        store.update_tier("u1", Tier::Coach).await.unwrap();

        let path = std::env::temp_dir().join(format!("growth-store-{}.json", Uuid::new_v4()));
        store.save_snapshot(&path).unwrap();

        let loaded = MemoryStore::open(&path).unwrap();
        let account = loaded.get_account("u1").await.unwrap().unwrap();
        assert_eq!(account.tier(), Some(Tier::Coach));
        assert_eq!(loaded.count_records(Collection::Tasks, "u1").await.unwrap(), 1);
        assert_eq!(loaded.count_records(Collection::Habits, "u1").await.unwrap(), 1);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_open_missing_snapshot_is_empty() {
        let path = std::env::temp_dir().join(format!("growth-missing-{}.json", Uuid::new_v4()));
        let store = MemoryStore::open(&path).unwrap();
        assert!(store.accounts.is_empty());
    }
}
