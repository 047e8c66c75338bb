//! Tier catalog — the fixed set of subscription tiers and their limits.

use growth_core::Tier;
use serde::{Deserialize, Serialize};

/// A resource ceiling. `-1` on the wire means unlimited; it is a separate
/// variant so it can never be compared as a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Limit {
    Capped(u32),
    Unlimited,
}

impl Limit {
    /// Wire value for [`Limit::Unlimited`].
    pub const UNLIMITED_SENTINEL: i64 = -1;

    /// Interpret a raw wire value. Negative values other than the sentinel
    /// are invalid and clamp to a cap of zero.
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            Self::UNLIMITED_SENTINEL => Self::Unlimited,
            n if n < 0 => Self::Capped(0),
            n => Self::Capped(u32::try_from(n).unwrap_or(u32::MAX)),
        }
    }

    pub fn as_raw(&self) -> i64 {
        match self {
            Self::Capped(n) => i64::from(*n),
            Self::Unlimited => Self::UNLIMITED_SENTINEL,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, Self::Unlimited)
    }

    /// Whether one more item may be created when `current` already exist.
    pub fn allows(&self, current: u64) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Capped(cap) => current < u64::from(*cap),
        }
    }
}

impl From<i64> for Limit {
    fn from(raw: i64) -> Self {
        Self::from_raw(raw)
    }
}

impl From<Limit> for i64 {
    fn from(limit: Limit) -> Self {
        limit.as_raw()
    }
}

impl std::fmt::Display for Limit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capped(n) => f.pad(&n.to_string()),
            Self::Unlimited => f.pad("unlimited"),
        }
    }
}

/// Countable resources a tier limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Habits,
    Tasks,
    JournalEntries,
}

impl Resource {
    pub const ALL: &'static [Resource] = &[Self::Habits, Self::Tasks, Self::JournalEntries];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Habits => "habits",
            Self::Tasks => "tasks",
            Self::JournalEntries => "journal_entries",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "habits" => Some(Self::Habits),
            "tasks" => Some(Self::Tasks),
            "journal_entries" => Some(Self::JournalEntries),
            _ => None,
        }
    }

    pub fn collection(&self) -> growth_core::Collection {
        match self {
            Self::Habits => growth_core::Collection::Habits,
            Self::Tasks => growth_core::Collection::Tasks,
            Self::JournalEntries => growth_core::Collection::JournalEntries,
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean capabilities a tier may grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Export,
    Admin,
    CoachMode,
    Analytics,
}

impl Feature {
    pub const ALL: &'static [Feature] = &[Self::Export, Self::Admin, Self::CoachMode, Self::Analytics];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Export => "export",
            Self::Admin => "admin",
            Self::CoachMode => "coach_mode",
            Self::Analytics => "analytics",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "export" => Some(Self::Export),
            "admin" => Some(Self::Admin),
            "coach_mode" => Some(Self::CoachMode),
            "analytics" => Some(Self::Analytics),
            _ => None,
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierLimits {
    pub habits: Limit,
    pub tasks: Limit,
    pub journal_entries: Limit,
}

impl TierLimits {
    pub fn get(&self, resource: Resource) -> Limit {
        match resource {
            Resource::Habits => self.habits,
            Resource::Tasks => self.tasks,
            Resource::JournalEntries => self.journal_entries,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct TierFeatures {
    pub export: bool,
    pub admin: bool,
    pub coach_mode: bool,
    pub analytics: bool,
}

impl TierFeatures {
    pub fn get(&self, feature: Feature) -> bool {
        match feature {
            Feature::Export => self.export,
            Feature::Admin => self.admin,
            Feature::CoachMode => self.coach_mode,
            Feature::Analytics => self.analytics,
        }
    }

    pub fn enabled(&self) -> Vec<Feature> {
        Feature::ALL.iter().copied().filter(|f| self.get(*f)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierDefinition {
    pub tier: Tier,
    pub name: &'static str,
    pub monthly_price_cents: u32,
    pub limits: TierLimits,
    pub features: TierFeatures,
}

static CATALOG: [TierDefinition; 3] = [
    TierDefinition {
        tier: Tier::Starter,
        name: "Starter",
        monthly_price_cents: 0,
        limits: TierLimits {
            habits: Limit::Capped(5),
            tasks: Limit::Capped(10),
            journal_entries: Limit::Capped(30),
        },
        features: TierFeatures {
            export: false,
            admin: false,
            coach_mode: false,
            analytics: false,
        },
    },
    TierDefinition {
        tier: Tier::Coach,
        name: "Coach",
        monthly_price_cents: 1900,
        limits: TierLimits {
            habits: Limit::Unlimited,
            tasks: Limit::Unlimited,
            journal_entries: Limit::Unlimited,
        },
        features: TierFeatures {
            export: true,
            admin: false,
            coach_mode: true,
            analytics: true,
        },
    },
    TierDefinition {
        tier: Tier::Business,
        name: "Business",
        monthly_price_cents: 4900,
        limits: TierLimits {
            habits: Limit::Unlimited,
            tasks: Limit::Unlimited,
            journal_entries: Limit::Unlimited,
        },
        features: TierFeatures {
            export: true,
            admin: true,
            coach_mode: true,
            analytics: true,
        },
    },
];

/// All tier definitions, least privileged first.
pub fn all() -> &'static [TierDefinition] {
    &CATALOG
}

/// Definition for a known tier.
pub fn definition(tier: Tier) -> &'static TierDefinition {
    match tier {
        Tier::Starter => &CATALOG[0],
        Tier::Coach => &CATALOG[1],
        Tier::Business => &CATALOG[2],
    }
}

/// Look up a tier by its wire id. Unknown ids return `None`, which callers
/// must treat as "no entitlements".
pub fn get_tier(id: &str) -> Option<&'static TierDefinition> {
    Tier::parse(id).map(definition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_order_matches_tiers() {
        let tiers: Vec<Tier> = all().iter().map(|d| d.tier).collect();
        assert_eq!(tiers, Tier::ALL);
        for tier in Tier::ALL {
            assert_eq!(definition(*tier).tier, *tier);
        }
    }

    #[test]
    fn test_get_tier_unknown() {
        assert!(get_tier("starter").is_some());
        assert!(get_tier("Starter").is_none());
        assert!(get_tier("platinum").is_none());
        assert!(get_tier("").is_none());
    }

    #[test]
    fn test_limit_from_raw() {
        assert_eq!(Limit::from_raw(-1), Limit::Unlimited);
        assert_eq!(Limit::from_raw(0), Limit::Capped(0));
        assert_eq!(Limit::from_raw(12), Limit::Capped(12));
        assert_eq!(Limit::from_raw(-7), Limit::Capped(0));
        assert_eq!(Limit::from_raw(i64::MAX), Limit::Capped(u32::MAX));
    }

    #[test]
    fn test_limit_allows() {
        let cap = Limit::Capped(5);
        assert!(cap.allows(4));
        assert!(!cap.allows(5));
        assert!(!Limit::Capped(0).allows(0));
        assert!(Limit::Unlimited.allows(u64::MAX));
    }

    #[test]
    fn test_limit_serializes_as_sentinel() {
        assert_eq!(serde_json::to_string(&Limit::Unlimited).unwrap(), "-1");
        let parsed: Limit = serde_json::from_str("-3").unwrap();
        assert_eq!(parsed, Limit::Capped(0));
    }

    #[test]
    fn test_only_business_has_admin() {
        let admins: Vec<Tier> = all()
            .iter()
            .filter(|d| d.features.admin)
            .map(|d| d.tier)
            .collect();
        assert_eq!(admins, vec![Tier::Business]);
    }

    #[test]
    fn test_resource_and_feature_names() {
        for r in Resource::ALL {
            assert_eq!(Resource::parse(r.as_str()), Some(*r));
        }
        for f in Feature::ALL {
            assert_eq!(Feature::parse(f.as_str()), Some(*f));
        }
        assert_eq!(Resource::parse("Habits"), None);
        assert_eq!(Feature::parse("coachMode"), None);
    }
}
