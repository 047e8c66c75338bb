//! Admin console for the Growth Dashboard — user listing with activity
//! counts, tier changes, and cascading account deletion.
//!
//! # Modules
//!
//! - [`user_ops`] — privileged user operations, gated on the `admin` capability

pub mod user_ops;

pub use user_ops::{AdminError, AdminOps, DeleteReport, TierChange, UserSummary};
