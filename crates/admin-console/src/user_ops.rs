//! User management — listing with live counts, tier mutation, and full
//! account deletion.
//!
//! Deletion runs as a saga: dependent collections are cleared concurrently,
//! and the account document is removed only once every one of them
//! succeeded. A failed step leaves the account in place so the call can be
//! retried.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::{join_all, try_join_all};
use growth_accounts::{AccountStore, StoreError};
use growth_core::{Collection, Tier, UserAccount};
use growth_licensing::{EntitlementGuard, Feature};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("{0} is not allowed to use the admin console")]
    Forbidden(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("deleting {uid} failed for: {}", join_collections(.failed))]
    PartialDelete { uid: String, failed: Vec<Collection> },
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn join_collections(collections: &[Collection]) -> String {
    collections
        .iter()
        .map(Collection::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl AdminError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Forbidden(_) => "You don't have access to the admin console.",
            Self::UserNotFound(_) => "We couldn't find that user.",
            Self::PartialDelete { .. } => {
                "The account could not be fully deleted. Please try again."
            }
            Self::Store(e) => e.user_message(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::PartialDelete { .. } => true,
            Self::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// One row of the admin user list.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    /// Raw stored value, shown as-is so corrupted tiers are visible.
    pub tier: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub habit_count: u64,
    pub task_count: u64,
    pub journal_entry_count: u64,
}

impl UserSummary {
    pub fn recognized_tier(&self) -> Option<Tier> {
        Tier::parse(&self.tier)
    }
}

/// Result of a tier change, with the previous value for the audit log.
#[derive(Debug, Clone, Serialize)]
pub struct TierChange {
    pub uid: String,
    pub previous_tier: String,
    pub new_tier: Tier,
    pub performed_by: String,
    pub performed_at: DateTime<Utc>,
}

/// Outcome of a completed account deletion.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub uid: String,
    /// Records removed per collection.
    pub removed: Vec<(Collection, u64)>,
    /// `false` when the account was already gone.
    pub account_removed: bool,
}

impl DeleteReport {
    pub fn total_removed(&self) -> u64 {
        self.removed.iter().map(|(_, n)| n).sum()
    }
}

/// Privileged user operations, bound to the acting admin.
pub struct AdminOps {
    store: Arc<dyn AccountStore>,
    actor: String,
}

impl AdminOps {
    /// Authorize `actor_uid` against the `admin` capability of their stored
    /// tier. Missing accounts and unrecognized tiers are refused.
    pub async fn for_actor(
        store: Arc<dyn AccountStore>,
        actor_uid: &str,
    ) -> Result<Self, AdminError> {
        let ops = Self {
            store,
            actor: actor_uid.to_string(),
        };
        ops.authorize().await?;
        Ok(ops)
    }

    /// Re-read the actor's tier. Runs before every privileged call so a
    /// demotion takes effect on handles that already exist.
    async fn authorize(&self) -> Result<(), AdminError> {
        let actor = self
            .store
            .get_account(&self.actor)
            .await?
            .ok_or_else(|| AdminError::Forbidden(self.actor.clone()))?;
        if !EntitlementGuard::resolve(&actor.tier).allows(Feature::Admin) {
            warn!(actor = %self.actor, tier = %actor.tier, "Admin access denied");
            return Err(AdminError::Forbidden(self.actor.clone()));
        }
        Ok(())
    }

    async fn summarize(&self, account: UserAccount) -> Result<UserSummary, AdminError> {
        let uid = account.uid.as_str();
        let (habit_count, task_count, journal_entry_count) = futures::try_join!(
            self.store.count_records(Collection::Habits, uid),
            self.store.count_records(Collection::Tasks, uid),
            self.store.count_records(Collection::JournalEntries, uid),
        )?;
        Ok(UserSummary {
            uid: account.uid.clone(),
            email: account.email,
            display_name: account.display_name,
            tier: account.tier,
            created_at: account.created_at,
            last_login_at: account.last_login_at,
            habit_count,
            task_count,
            journal_entry_count,
        })
    }

    /// All users, newest account first, with live record counts.
    pub async fn list_users(&self) -> Result<Vec<UserSummary>, AdminError> {
        self.authorize().await?;
        let accounts = self.store.list_accounts().await?;
        let mut users = try_join_all(accounts.into_iter().map(|a| self.summarize(a))).await?;
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.uid.cmp(&b.uid)));
        Ok(users)
    }

    pub async fn get_user(&self, uid: &str) -> Result<UserSummary, AdminError> {
        self.authorize().await?;
        let account = self
            .store
            .get_account(uid)
            .await?
            .ok_or_else(|| AdminError::UserNotFound(uid.to_string()))?;
        self.summarize(account).await
    }

    /// Change a user's tier. Only the tier and `updated_at` are written;
    /// any entitlement state cached elsewhere is stale after this returns.
    pub async fn update_user_tier(&self, uid: &str, new_tier: Tier) -> Result<TierChange, AdminError> {
        self.authorize().await?;
        let previous = self
            .store
            .get_account(uid)
            .await?
            .ok_or_else(|| AdminError::UserNotFound(uid.to_string()))?;
        let updated = self.store.update_tier(uid, new_tier).await.map_err(|e| match e {
            StoreError::AccountNotFound(uid) => AdminError::UserNotFound(uid),
            other => other.into(),
        })?;

        info!(
            actor = %self.actor,
            uid,
            previous_tier = %previous.tier,
            new_tier = %new_tier,
            "User tier updated"
        );
        Ok(TierChange {
            uid: uid.to_string(),
            previous_tier: previous.tier,
            new_tier,
            performed_by: self.actor.clone(),
            performed_at: updated.updated_at,
        })
    }

    /// Delete a user and every record they own. Dependent collections are
    /// cleared concurrently; the account is removed only after all of them
    /// succeed. Deleting an already-deleted user succeeds.
    pub async fn delete_user(&self, uid: &str) -> Result<DeleteReport, AdminError> {
        self.authorize().await?;
        let outcomes = join_all(Collection::ALL.iter().map(|collection| async move {
            (*collection, self.store.delete_owned(*collection, uid).await)
        }))
        .await;

        let mut removed = Vec::with_capacity(outcomes.len());
        let mut failed = Vec::new();
        for (collection, outcome) in outcomes {
            match outcome {
                Ok(count) => removed.push((collection, count)),
                Err(e) => {
                    error!(uid, %collection, error = %e, "Dependent delete failed");
                    failed.push(collection);
                }
            }
        }
        if !failed.is_empty() {
            return Err(AdminError::PartialDelete {
                uid: uid.to_string(),
                failed,
            });
        }

        let account_removed = self.store.delete_account(uid).await?;
        let report = DeleteReport {
            uid: uid.to_string(),
            removed,
            account_removed,
        };
        info!(
            actor = %self.actor,
            uid,
            records_removed = report.total_removed(),
            account_removed,
            "User deleted"
        );
        Ok(report)
    }
}
