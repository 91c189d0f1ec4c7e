//! The `Event` value type and the `EventStore` port it's read and written
//! through. Concrete backends (SQLite, Google Calendar) live in
//! [`crate::store`]; everything in this module is backend-agnostic.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::slots::{duration_to_slots, slot_of, SLOTS_PER_DAY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Work,
    Health,
    Social,
    #[default]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    pub time: String,
    pub duration_minutes: i64,
    pub description: String,
    pub category: Category,
}

impl Event {
    /// `[start, end)` in slot indices, for overlap arithmetic.
    pub fn slot_range(&self) -> Result<(usize, usize)> {
        let start = slot_of(&self.time)?;
        let len = duration_to_slots(self.duration_minutes)?;
        Ok((start, start + len))
    }

    /// An event must fit within a single day's slot grid; this is enforced
    /// at creation, not at read time.
    pub fn fits_in_one_day(&self) -> Result<bool> {
        let (_, end) = self.slot_range()?;
        Ok(end <= SLOTS_PER_DAY)
    }
}

/// A partial update: every field is optional, and only `Some` fields are
/// applied by the store's `update`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventChanges {
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub duration_minutes: Option<i64>,
    pub description: Option<String>,
    pub category: Option<Category>,
}

impl EventChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.date.is_none()
            && self.time.is_none()
            && self.duration_minutes.is_none()
            && self.description.is_none()
            && self.category.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub title: String,
    pub date: NaiveDate,
    pub time: String,
    pub duration_minutes: i64,
    pub description: String,
}

impl NewEvent {
    /// Same single-day check as [`Event::fits_in_one_day`], applied before
    /// a store accepts the event. An event that runs past midnight has no
    /// representation in the single-day slot grid the Scheduling Core
    /// assumes, so stores must reject it at creation rather than let it in
    /// silently.
    pub fn fits_in_one_day(&self) -> Result<bool> {
        let start = slot_of(&self.time)?;
        let len = duration_to_slots(self.duration_minutes)?;
        Ok(start + len <= SLOTS_PER_DAY)
    }
}

/// Port onto the user's canonical calendar. Every method fails with one of
/// the store-level error kinds (`AuthExpired`, `NotFound`, `Network`,
/// `Backend`) rather than a backend-specific type.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn list(&self, date: NaiveDate) -> Result<Vec<Event>>;
    async fn list_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Event>>;
    async fn create(&self, new_event: NewEvent) -> Result<Event>;
    async fn update(&self, id: &str, changes: EventChanges) -> Result<Event>;
    async fn delete(&self, id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(time: &str, duration: i64) -> Event {
        Event {
            id: "e1".into(),
            title: "gym".into(),
            date: NaiveDate::from_ymd_opt(2026, 2, 18).unwrap(),
            time: time.into(),
            duration_minutes: duration,
            description: String::new(),
            category: Category::Other,
        }
    }

    #[test]
    fn fits_in_one_day_true_for_normal_event() {
        assert!(event("09:00", 60).fits_in_one_day().unwrap());
    }

    #[test]
    fn fits_in_one_day_false_past_day_end() {
        assert!(!event("21:30", 60).fits_in_one_day().unwrap());
    }
}
