//! Record creation and edits scoped to their owner.
//!
//! Creation of limited resources reads the owner's tier fresh from the
//! store and checks the current count against the tier quota first.

use std::sync::Arc;

use chrono::NaiveDate;
use growth_core::types::{Habit, HabitFrequency, JournalEntry, Review, Task, TaskPriority};
use growth_core::{Collection, Record};
use growth_licensing::{EntitlementGuard, Resource};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{require_account, AccountStore, RecordError, StoreError};

/// Optional task fields.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub due_date: Option<NaiveDate>,
    pub priority: TaskPriority,
}

pub struct RecordService {
    store: Arc<dyn AccountStore>,
}

impl RecordService {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    async fn ensure_quota(&self, uid: &str, resource: Resource) -> Result<(), RecordError> {
        let account = require_account(self.store.as_ref(), uid).await?;
        let current = self.store.count_records(resource.collection(), uid).await?;
        EntitlementGuard::resolve(&account.tier)
            .check_quota(resource, current)
            .map_err(|e| {
                warn!(uid, tier = %account.tier, %resource, current, "Quota check denied");
                e
            })?;
        Ok(())
    }

    async fn insert(&self, record: Record) -> Result<(), RecordError> {
        info!(
            uid = %record.owner_id(),
            collection = %record.collection(),
            id = %record.id(),
            "Record created"
        );
        self.store.insert_record(record).await?;
        Ok(())
    }

    pub async fn create_habit(
        &self,
        uid: &str,
        name: &str,
        frequency: HabitFrequency,
    ) -> Result<Habit, RecordError> {
        self.ensure_quota(uid, Resource::Habits).await?;
        let habit = Habit::new(uid, name, frequency);
        self.insert(habit.clone().into()).await?;
        Ok(habit)
    }

    pub async fn create_task(
        &self,
        uid: &str,
        title: &str,
        draft: TaskDraft,
    ) -> Result<Task, RecordError> {
        self.ensure_quota(uid, Resource::Tasks).await?;
        let mut task = Task::new(uid, title);
        task.due_date = draft.due_date;
        task.priority = draft.priority;
        self.insert(task.clone().into()).await?;
        Ok(task)
    }

    pub async fn create_journal_entry(
        &self,
        uid: &str,
        title: &str,
        body: &str,
        mood: Option<u8>,
    ) -> Result<JournalEntry, RecordError> {
        self.ensure_quota(uid, Resource::JournalEntries).await?;
        let mut entry = JournalEntry::new(uid, title, body);
        if let Some(mood) = mood {
            entry = entry.with_mood(mood);
        }
        self.insert(entry.clone().into()).await?;
        Ok(entry)
    }

    /// Weekly reviews are not quota limited.
    pub async fn create_review(
        &self,
        uid: &str,
        week_start: NaiveDate,
        wins: Vec<String>,
        lessons: Vec<String>,
        next_focus: &str,
    ) -> Result<Review, RecordError> {
        require_account(self.store.as_ref(), uid).await?;
        let mut review = Review::new(uid, week_start);
        review.wins = wins;
        review.lessons = lessons;
        review.next_focus = next_focus.to_string();
        self.insert(review.clone().into()).await?;
        Ok(review)
    }

    pub async fn list(&self, uid: &str, collection: Collection) -> Result<Vec<Record>, RecordError> {
        Ok(self.store.list_records(collection, uid).await?)
    }

    /// Fetch a record owned by `uid`. Records of other owners are reported
    /// as not found.
    async fn owned(&self, uid: &str, collection: Collection, id: Uuid) -> Result<Record, RecordError> {
        match self.store.get_record(collection, id).await? {
            Some(record) if record.owner_id() == uid => Ok(record),
            _ => Err(StoreError::RecordNotFound { collection, id }.into()),
        }
    }

    pub async fn complete_habit(
        &self,
        uid: &str,
        habit_id: Uuid,
        day: NaiveDate,
    ) -> Result<Habit, RecordError> {
        let Record::Habit(mut habit) = self.owned(uid, Collection::Habits, habit_id).await? else {
            return Err(StoreError::RecordNotFound {
                collection: Collection::Habits,
                id: habit_id,
            }
            .into());
        };
        habit.complete_on(day);
        self.store.update_record(habit.clone().into()).await?;
        Ok(habit)
    }

    pub async fn set_task_completed(
        &self,
        uid: &str,
        task_id: Uuid,
        completed: bool,
    ) -> Result<Task, RecordError> {
        let Record::Task(mut task) = self.owned(uid, Collection::Tasks, task_id).await? else {
            return Err(StoreError::RecordNotFound {
                collection: Collection::Tasks,
                id: task_id,
            }
            .into());
        };
        if task.completed != completed {
            task.completed = completed;
            task.updated_at = chrono::Utc::now();
            self.store.update_record(task.clone().into()).await?;
        }
        Ok(task)
    }

    pub async fn delete(&self, uid: &str, collection: Collection, id: Uuid) -> Result<(), RecordError> {
        self.owned(uid, collection, id).await?;
        self.store.delete_record(collection, id).await?;
        info!(uid, %collection, %id, "Record deleted");
        Ok(())
    }
}
