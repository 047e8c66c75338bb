//! Growth Dashboard licensing — tier catalog, entitlement gate, and license
//! key validation against the external license service.
//!
//! Every decision in this crate fails closed: unknown tiers, unrecognized
//! features and ambiguous license payloads resolve to the least privileged
//! outcome, never to an elevated one.

pub mod catalog;
pub mod entitlements;
pub mod validator;

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use catalog::{Feature, Limit, Resource, TierDefinition, TierFeatures, TierLimits};
pub use entitlements::{check_quota, get_limit, is_feature_enabled, is_unlimited, EntitlementGuard};
pub use validator::{
    HttpLicenseService, LicensePayload, LicenseService, LicenseValidation, LicenseValidator,
    TierSource, ValidationEnvelope, TIER_PRECEDENCE,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a license key failed to validate.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LicenseError {
    #[error("license key is empty")]
    EmptyKey,
    #[error("license service timed out after {0:?}")]
    Timeout(Duration),
    #[error("license service unreachable: {0}")]
    Network(String),
    #[error("malformed license service response: {0}")]
    Malformed(String),
    #[error("license key rejected: {0}")]
    Rejected(String),
    #[error("license expired at {0}")]
    Expired(DateTime<Utc>),
    #[error("license is for product `{actual}`, expected `{expected}`")]
    WrongProduct { expected: String, actual: String },
}

impl LicenseError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Whether the user should simply try again rather than fix the key.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Network(_))
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmptyKey => "Please enter a license key.",
            Self::Timeout(_) => "License check took too long. Please try again.",
            Self::Network(_) | Self::Malformed(_) => {
                "We couldn't verify your license right now. Please try again."
            }
            Self::Rejected(_) | Self::WrongProduct { .. } => "That license key is not valid.",
            Self::Expired(_) => "That license key has expired.",
        }
    }
}

/// Denied entitlement checks.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EntitlementError {
    #[error("{resource} limit reached: {current} of {limit}")]
    QuotaExceeded {
        resource: Resource,
        limit: Limit,
        current: u64,
    },
    #[error("feature `{0}` is not included in this plan")]
    FeatureNotEnabled(Feature),
}

impl EntitlementError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::QuotaExceeded { .. } => "You've reached your plan's limit. Upgrade to add more.",
            Self::FeatureNotEnabled(_) => "This feature isn't included in your plan.",
        }
    }
}
