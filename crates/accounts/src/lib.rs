//! Account storage for the Growth Dashboard — per-user collections of
//! habits, tasks, journal entries, reviews and license records.
//!
//! # Modules
//!
//! - [`memory`] — DashMap-backed store with explicit JSON snapshots
//! - [`records`] — quota-checked record creation and owner-scoped edits
//! - [`session`] — per-session entitlement snapshot
//! - [`redemption`] — redeem a license key and apply its tier

pub mod memory;
pub mod records;
pub mod redemption;
pub mod session;

use async_trait::async_trait;
use growth_core::{Collection, Record, Tier, UserAccount};
use growth_licensing::{EntitlementError, LicenseError};
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use records::RecordService;
pub use redemption::{redeem_license, Redemption};
pub use session::EntitlementSession;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("record not found: {collection}/{id}")]
    RecordNotFound { collection: Collection, id: Uuid },
    #[error("account already exists: {0}")]
    AccountExists(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::AccountNotFound(_) => "We couldn't find that account.",
            Self::RecordNotFound { .. } => "That item no longer exists.",
            Self::AccountExists(_) => "An account with that id already exists.",
            Self::Unavailable(_) | Self::Io(_) => "We couldn't reach the server. Please try again.",
            Self::Json(_) => "Something went wrong on our side.",
        }
    }
}

/// Failures creating or editing a user's records.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Entitlement(#[from] EntitlementError),
}

impl RecordError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Store(e) => e.user_message(),
            Self::Entitlement(e) => e.user_message(),
        }
    }
}

/// Failures redeeming a license key.
#[derive(Debug, Error)]
pub enum RedeemError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    License(#[from] LicenseError),
}

impl RedeemError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Store(e) => e.user_message(),
            Self::License(e) => e.user_message(),
        }
    }
}

// ---------------------------------------------------------------------------
// Store seam
// ---------------------------------------------------------------------------

/// Profile fields a user may edit. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// The hosted document database: accounts plus account-scoped collections
/// queried by owner id.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fails with [`StoreError::AccountExists`] when the uid is taken.
    async fn create_account(&self, account: UserAccount) -> Result<UserAccount, StoreError>;

    async fn get_account(&self, uid: &str) -> Result<Option<UserAccount>, StoreError>;

    async fn list_accounts(&self) -> Result<Vec<UserAccount>, StoreError>;

    async fn update_profile(
        &self,
        uid: &str,
        update: ProfileUpdate,
    ) -> Result<UserAccount, StoreError>;

    async fn record_login(&self, uid: &str) -> Result<UserAccount, StoreError>;

    /// Set the tier and `updated_at`; no other field changes.
    async fn update_tier(&self, uid: &str, tier: Tier) -> Result<UserAccount, StoreError>;

    /// Returns `false` when no such account existed.
    async fn delete_account(&self, uid: &str) -> Result<bool, StoreError>;

    async fn insert_record(&self, record: Record) -> Result<(), StoreError>;

    async fn get_record(&self, collection: Collection, id: Uuid)
        -> Result<Option<Record>, StoreError>;

    /// Replace an existing record.
    async fn update_record(&self, record: Record) -> Result<(), StoreError>;

    async fn list_records(
        &self,
        collection: Collection,
        owner_id: &str,
    ) -> Result<Vec<Record>, StoreError>;

    async fn count_records(&self, collection: Collection, owner_id: &str) -> Result<u64, StoreError>;

    /// Returns `false` when no such record existed.
    async fn delete_record(&self, collection: Collection, id: Uuid) -> Result<bool, StoreError>;

    /// Delete every record in `collection` owned by `owner_id`, returning how
    /// many were removed. Zero matches is not an error.
    async fn delete_owned(&self, collection: Collection, owner_id: &str) -> Result<u64, StoreError>;
}

/// Fetch an account or fail with [`StoreError::AccountNotFound`].
pub async fn require_account(
    store: &dyn AccountStore,
    uid: &str,
) -> Result<UserAccount, StoreError> {
    store
        .get_account(uid)
        .await?
        .ok_or_else(|| StoreError::AccountNotFound(uid.to_string()))
}
