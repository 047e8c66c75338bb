use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Tiers ──────────────────────────────────────────────────────────────────

/// Subscription tier. Wire values are the case-sensitive strings
/// `starter`, `coach` and `business`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Starter,
    Coach,
    Business,
}

impl Tier {
    /// All tiers, least privileged first.
    pub const ALL: &'static [Tier] = &[Self::Starter, Self::Coach, Self::Business];

    /// Tier assigned whenever tier data is missing or ambiguous.
    pub const LEAST_PRIVILEGED: Tier = Tier::Starter;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Coach => "coach",
            Self::Business => "business",
        }
    }

    /// Parse a wire value. Matching is exact: `"Coach"` is not a tier.
    pub fn parse(value: &str) -> Option<Tier> {
        match value {
            "starter" => Some(Self::Starter),
            "coach" => Some(Self::Coach),
            "business" => Some(Self::Business),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = crate::GrowthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::parse(s).ok_or_else(|| crate::GrowthError::UnknownTier(s.to_string()))
    }
}

// ─── Accounts ───────────────────────────────────────────────────────────────

/// A user account. The tier is stored as the raw wire string so that a
/// corrupted value survives a round trip and is resolved at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub tier: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    /// A freshly signed-up account on the least privileged tier.
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            uid: uid.into(),
            email: email.into(),
            display_name: None,
            tier: Tier::LEAST_PRIVILEGED.as_str().to_string(),
            created_at: now,
            last_login_at: None,
            updated_at: now,
        }
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier.as_str().to_string();
        self
    }

    /// The recognized tier, or `None` when the stored value is unrecognized.
    pub fn tier(&self) -> Option<Tier> {
        Tier::parse(&self.tier)
    }
}

// ─── Collections ────────────────────────────────────────────────────────────

/// Account-scoped collections. Every record in these references its owner
/// by id and must be removed when the owner is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Habits,
    Tasks,
    JournalEntries,
    Reviews,
    Licenses,
}

impl Collection {
    pub const ALL: &'static [Collection] = &[
        Self::Habits,
        Self::Tasks,
        Self::JournalEntries,
        Self::Reviews,
        Self::Licenses,
    ];

    /// Collections whose sizes are reported in admin listings.
    pub const COUNTED: &'static [Collection] =
        &[Self::Habits, Self::Tasks, Self::JournalEntries];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Habits => "habits",
            Self::Tasks => "tasks",
            Self::JournalEntries => "journal_entries",
            Self::Reviews => "reviews",
            Self::Licenses => "licenses",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Records ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitFrequency {
    Daily,
    Weekly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub frequency: HabitFrequency,
    pub streak: u32,
    pub last_completed_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Habit {
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>, frequency: HabitFrequency) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            name: name.into(),
            frequency,
            streak: 0,
            last_completed_on: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the habit done on `day`. Consecutive periods extend the streak,
    /// a gap resets it to one. Repeating the same period, or backdating
    /// before the last completion, is a no-op.
    pub fn complete_on(&mut self, day: NaiveDate) {
        let period = match self.frequency {
            HabitFrequency::Daily => 1,
            HabitFrequency::Weekly => 7,
        };
        match self.last_completed_on.map(|last| (day - last).num_days()) {
            Some(elapsed) if elapsed < period => return,
            Some(elapsed) if elapsed < period * 2 => self.streak += 1,
            _ => self.streak = 1,
        }
        self.last_completed_on = Some(day);
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub completed: bool,
    pub due_date: Option<NaiveDate>,
    pub priority: TaskPriority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(owner_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            title: title.into(),
            completed: false,
            due_date: None,
            priority: TaskPriority::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub body: String,
    /// 1 (low) to 5 (high).
    pub mood: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn new(owner_id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            title: title.into(),
            body: body.into(),
            mood: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the mood, clamped into `1..=5`.
    pub fn with_mood(mut self, mood: u8) -> Self {
        self.mood = Some(mood.clamp(1, 5));
        self
    }
}

/// Weekly review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub owner_id: String,
    pub week_start: NaiveDate,
    pub wins: Vec<String>,
    pub lessons: Vec<String>,
    pub next_focus: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    pub fn new(owner_id: impl Into<String>, week_start: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            week_start,
            wins: Vec::new(),
            lessons: Vec::new(),
            next_focus: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A redeemed license key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub license_key: String,
    pub product_id: String,
    pub tier: Tier,
    pub valid: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LicenseRecord {
    /// Whether this record currently grants its tier.
    pub fn is_active(&self) -> bool {
        self.valid && self.expires_at.map_or(true, |exp| exp > Utc::now())
    }
}

/// Any account-scoped record, tagged by the collection it lives in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "collection", rename_all = "snake_case")]
pub enum Record {
    Habit(Habit),
    Task(Task),
    JournalEntry(JournalEntry),
    Review(Review),
    License(LicenseRecord),
}

impl Record {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Habit(r) => r.id,
            Self::Task(r) => r.id,
            Self::JournalEntry(r) => r.id,
            Self::Review(r) => r.id,
            Self::License(r) => r.id,
        }
    }

    pub fn owner_id(&self) -> &str {
        match self {
            Self::Habit(r) => &r.owner_id,
            Self::Task(r) => &r.owner_id,
            Self::JournalEntry(r) => &r.owner_id,
            Self::Review(r) => &r.owner_id,
            Self::License(r) => &r.owner_id,
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            Self::Habit(_) => Collection::Habits,
            Self::Task(_) => Collection::Tasks,
            Self::JournalEntry(_) => Collection::JournalEntries,
            Self::Review(_) => Collection::Reviews,
            Self::License(_) => Collection::Licenses,
        }
    }
}

macro_rules! impl_from_record {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Record {
            fn from(r: $ty) -> Self {
                Record::$variant(r)
            }
        })*
    };
}

impl_from_record!(
    Habit => Habit,
    Task => Task,
    JournalEntry => JournalEntry,
    Review => Review,
    LicenseRecord => License,
);

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_tier_parse_is_case_sensitive() {
        assert_eq!(Tier::parse("coach"), Some(Tier::Coach));
        assert_eq!(Tier::parse("Coach"), None);
        assert_eq!(Tier::parse(" business"), None);
        assert!("enterprise".parse::<Tier>().is_err());
    }

    #[test]
    fn test_tier_serde_uses_wire_names() {
        let json = serde_json::to_string(&Tier::Business).unwrap();
        assert_eq!(json, "\"business\"");
        assert!(serde_json::from_str::<Tier>("\"BUSINESS\"").is_err());
    }

    #[test]
    fn test_tier_from_str_error() {
        let err = "gold".parse::<Tier>().unwrap_err();
        assert!(matches!(err, crate::GrowthError::UnknownTier(ref t) if t == "gold"));
        assert_eq!(err.user_message(), "Your plan couldn't be recognized.");
    }

    #[test]
    fn test_account_with_corrupted_tier() {
        let mut account = UserAccount::new("u1", "u1@example.com");
        assert_eq!(account.tier(), Some(Tier::Starter));
        account.tier = "platinum".into();
        assert_eq!(account.tier(), None);
    }

    #[test]
    fn test_daily_habit_streak() {
        let mut habit = Habit::new("u1", "Read", HabitFrequency::Daily);
        habit.complete_on(day(1));
        habit.complete_on(day(2));
        habit.complete_on(day(2));
        assert_eq!(habit.streak, 2);

        habit.complete_on(day(5));
        assert_eq!(habit.streak, 1);
    }

    #[test]
    fn test_weekly_habit_streak() {
        let mut habit = Habit::new("u1", "Long run", HabitFrequency::Weekly);
        habit.complete_on(day(1));
        habit.complete_on(day(4));
        assert_eq!(habit.streak, 1);
        habit.complete_on(day(9));
        assert_eq!(habit.streak, 2);
        habit.complete_on(day(30));
        assert_eq!(habit.streak, 1);
    }

    #[test]
    fn test_record_tagging() {
        let record: Record = Task::new("u1", "Ship").into();
        assert_eq!(record.collection(), Collection::Tasks);
        assert_eq!(record.owner_id(), "u1");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["collection"], "task");
    }

    #[test]
    fn test_journal_mood_clamped() {
        let entry = JournalEntry::new("u1", "Mon", "ok").with_mood(9);
        assert_eq!(entry.mood, Some(5));
    }
}
