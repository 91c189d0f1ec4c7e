//! Event Store adapters (C13): concrete backends behind the
//! [`crate::event::EventStore`] port. [`sqlite::SqliteEventStore`] is the
//! default, offline backend; [`google::GoogleCalendarStore`] talks to the
//! user's real calendar.

pub mod google;
pub mod sqlite;

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{AionError, Result};
use crate::event::{Event, EventChanges, EventStore, NewEvent};

/// An in-memory [`EventStore`] used by tests in this crate and available
/// to downstream crates' tests too, so exercising the dispatcher or chain
/// coordinator never requires a real database or network connection.
pub struct MemoryEventStore {
    events: Mutex<Vec<Event>>,
    next_id: Mutex<u64>,
}

impl MemoryEventStore {
    pub fn new() -> MemoryEventStore {
        MemoryEventStore {
            events: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
        }
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        MemoryEventStore::new()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn list(&self, date: NaiveDate) -> Result<Vec<Event>> {
        let mut events: Vec<Event> = self.events.lock().unwrap().iter().filter(|e| e.date == date).cloned().collect();
        events.sort_by(|a, b| a.time.cmp(&b.time));
        Ok(events)
    }

    async fn list_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Event>> {
        let mut events: Vec<Event> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.date >= start && e.date <= end)
            .cloned()
            .collect();
        events.sort_by(|a, b| (a.date, a.time.clone()).cmp(&(b.date, b.time.clone())));
        Ok(events)
    }

    async fn create(&self, new_event: NewEvent) -> Result<Event> {
        if !new_event.fits_in_one_day()? {
            return Err(AionError::InvalidTime(format!(
                "{} for {} minutes runs past midnight",
                new_event.time, new_event.duration_minutes
            )));
        }
        let mut next_id = self.next_id.lock().unwrap();
        let event = Event {
            id: format!("mem-{}", *next_id),
            title: new_event.title,
            date: new_event.date,
            time: new_event.time,
            duration_minutes: new_event.duration_minutes,
            description: new_event.description,
            category: crate::event::Category::Other,
        };
        *next_id += 1;
        self.events.lock().unwrap().push(event.clone());
        Ok(event)
    }

    async fn update(&self, id: &str, changes: EventChanges) -> Result<Event> {
        let mut events = self.events.lock().unwrap();
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| AionError::NotFound(id.to_string()))?;
        if let Some(title) = changes.title {
            event.title = title;
        }
        if let Some(date) = changes.date {
            event.date = date;
        }
        if let Some(time) = changes.time {
            event.time = time;
        }
        if let Some(duration) = changes.duration_minutes {
            event.duration_minutes = duration;
        }
        if let Some(description) = changes.description {
            event.description = description;
        }
        if let Some(category) = changes.category {
            event.category = category;
        }
        Ok(event.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|e| e.id != id);
        if events.len() == before {
            return Err(AionError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn create_then_list_round_trips() {
        let store = MemoryEventStore::new();
        let date = ymd(2026, 2, 18);
        store
            .create(NewEvent {
                title: "gym".into(),
                date,
                time: "09:00".into(),
                duration_minutes: 60,
                description: String::new(),
            })
            .await
            .unwrap();
        let events = store.list(date).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "gym");
    }

    #[tokio::test]
    async fn delete_missing_id_is_not_found() {
        let store = MemoryEventStore::new();
        assert!(matches!(store.delete("missing").await, Err(AionError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_merges_only_present_fields() {
        let store = MemoryEventStore::new();
        let date = ymd(2026, 2, 18);
        let event = store
            .create(NewEvent {
                title: "gym".into(),
                date,
                time: "09:00".into(),
                duration_minutes: 60,
                description: "leg day".into(),
            })
            .await
            .unwrap();

        let updated = store
            .update(
                &event.id,
                EventChanges {
                    time: Some("10:00".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.time, "10:00");
        assert_eq!(updated.title, "gym");
        assert_eq!(updated.description, "leg day");
    }
}
