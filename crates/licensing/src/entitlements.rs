//! Entitlement gate. Every check fails closed: an unknown tier, feature or
//! resource resolves to "denied" or a cap of zero.

use growth_core::Tier;
use tracing::warn;

use crate::catalog::{self, Feature, Limit, Resource, TierDefinition};
use crate::EntitlementError;

/// Entitlements resolved from a stored tier value.
#[derive(Debug, Clone, Copy)]
pub struct EntitlementGuard {
    definition: Option<&'static TierDefinition>,
}

impl EntitlementGuard {
    /// Resolve a raw tier value. Unrecognized values yield a guard that
    /// grants nothing.
    pub fn resolve(raw_tier: &str) -> Self {
        let definition = catalog::get_tier(raw_tier);
        if definition.is_none() {
            warn!(tier = %raw_tier, "Unrecognized tier, denying all entitlements");
        }
        Self { definition }
    }

    pub fn for_tier(tier: Tier) -> Self {
        Self {
            definition: Some(catalog::definition(tier)),
        }
    }

    /// The recognized tier, if any.
    pub fn tier(&self) -> Option<Tier> {
        self.definition.map(|d| d.tier)
    }

    pub fn allows(&self, feature: Feature) -> bool {
        self.definition.is_some_and(|d| d.features.get(feature))
    }

    pub fn limit(&self, resource: Resource) -> Limit {
        self.definition
            .map_or(Limit::Capped(0), |d| d.limits.get(resource))
    }

    pub fn require_feature(&self, feature: Feature) -> Result<(), EntitlementError> {
        if self.allows(feature) {
            Ok(())
        } else {
            Err(EntitlementError::FeatureNotEnabled(feature))
        }
    }

    /// Check whether one more `resource` may be created given `current`.
    pub fn check_quota(&self, resource: Resource, current: u64) -> Result<(), EntitlementError> {
        let limit = self.limit(resource);
        if limit.allows(current) {
            Ok(())
        } else {
            Err(EntitlementError::QuotaExceeded {
                resource,
                limit,
                current,
            })
        }
    }
}

/// Whether `feature_name` is enabled for `tier`. Unknown tier or feature
/// names return `false`.
pub fn is_feature_enabled(tier: &str, feature_name: &str) -> bool {
    match Feature::parse(feature_name) {
        Some(feature) => EntitlementGuard::resolve(tier).allows(feature),
        None => false,
    }
}

/// Raw limit for `resource_name` under `tier`: a non-negative cap, or `-1`
/// for unlimited. Unknown tier or resource names return `0`.
pub fn get_limit(tier: &str, resource_name: &str) -> i64 {
    match Resource::parse(resource_name) {
        Some(resource) => EntitlementGuard::resolve(tier).limit(resource).as_raw(),
        None => 0,
    }
}

/// True iff the tier's habit limit is the unlimited sentinel.
pub fn is_unlimited(tier: &str) -> bool {
    EntitlementGuard::resolve(tier)
        .limit(Resource::Habits)
        .is_unlimited()
}

/// Check a creation against the quota for `tier`.
pub fn check_quota(tier: &str, resource: Resource, current: u64) -> Result<(), EntitlementError> {
    EntitlementGuard::resolve(tier).check_quota(resource, current)
}
