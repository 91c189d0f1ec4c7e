//! The offline SQLite [`EventStore`] backend. Default when `AppConfig::backend`
//! is [`crate::config::Backend::Sqlite`].

use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};

use crate::error::{AionError, Result};
use crate::event::{Category, Event, EventChanges, EventStore, NewEvent};

const CREATE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    date TEXT NOT NULL,
    time TEXT NOT NULL,
    duration_minutes INTEGER NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL DEFAULT 'other'
)";

#[derive(Debug, FromRow)]
struct EventRow {
    id: String,
    title: String,
    date: String,
    time: String,
    duration_minutes: i64,
    description: String,
    category: String,
}

impl TryFrom<EventRow> for Event {
    type Error = AionError;

    fn try_from(row: EventRow) -> Result<Event> {
        Ok(Event {
            id: row.id,
            title: row.title,
            date: NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
                .map_err(|e| AionError::Backend(format!("corrupt stored date {}: {e}", row.date)))?,
            time: row.time,
            duration_minutes: row.duration_minutes,
            description: row.description,
            category: category_from_str(&row.category),
        })
    }
}

fn category_from_str(s: &str) -> Category {
    match s {
        "work" => Category::Work,
        "health" => Category::Health,
        "social" => Category::Social,
        _ => Category::Other,
    }
}

fn category_to_str(c: Category) -> &'static str {
    match c {
        Category::Work => "work",
        Category::Health => "health",
        Category::Social => "social",
        Category::Other => "other",
    }
}

pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    pub async fn connect(path: &std::path::Path) -> Result<SqliteEventStore> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(|e| AionError::Backend(e.to_string()))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| AionError::Backend(e.to_string()))?;
        sqlx::query(CREATE_TABLE).execute(&pool).await.map_err(|e| AionError::Backend(e.to_string()))?;
        Ok(SqliteEventStore { pool })
    }

    /// An in-memory connection, for tests and the Chain Coordinator's
    /// pre-solve scratch scenarios.
    pub async fn connect_in_memory() -> Result<SqliteEventStore> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| AionError::Backend(e.to_string()))?;
        sqlx::query(CREATE_TABLE).execute(&pool).await.map_err(|e| AionError::Backend(e.to_string()))?;
        Ok(SqliteEventStore { pool })
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn list(&self, date: NaiveDate) -> Result<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as("SELECT * FROM events WHERE date = ? ORDER BY time ASC")
            .bind(date.format("%Y-%m-%d").to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AionError::Backend(e.to_string()))?;
        rows.into_iter().map(Event::try_from).collect()
    }

    async fn list_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as("SELECT * FROM events WHERE date >= ? AND date <= ? ORDER BY date ASC, time ASC")
            .bind(start.format("%Y-%m-%d").to_string())
            .bind(end.format("%Y-%m-%d").to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AionError::Backend(e.to_string()))?;
        rows.into_iter().map(Event::try_from).collect()
    }

    async fn create(&self, new_event: NewEvent) -> Result<Event> {
        if !new_event.fits_in_one_day()? {
            return Err(AionError::InvalidTime(format!(
                "{} for {} minutes runs past midnight",
                new_event.time, new_event.duration_minutes
            )));
        }
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO events (id, title, date, time, duration_minutes, description, category) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new_event.title)
        .bind(new_event.date.format("%Y-%m-%d").to_string())
        .bind(&new_event.time)
        .bind(new_event.duration_minutes)
        .bind(&new_event.description)
        .bind(category_to_str(Category::Other))
        .execute(&self.pool)
        .await
        .map_err(|e| AionError::Backend(e.to_string()))?;

        Ok(Event {
            id,
            title: new_event.title,
            date: new_event.date,
            time: new_event.time,
            duration_minutes: new_event.duration_minutes,
            description: new_event.description,
            category: Category::Other,
        })
    }

    async fn update(&self, id: &str, changes: EventChanges) -> Result<Event> {
        let row: EventRow = sqlx::query_as("SELECT * FROM events WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AionError::Backend(e.to_string()))?
            .ok_or_else(|| AionError::NotFound(id.to_string()))?;
        let mut event = Event::try_from(row)?;

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

        sqlx::query(
            "UPDATE events SET title = ?, date = ?, time = ?, duration_minutes = ?, description = ?, category = ? \
             WHERE id = ?",
        )
        .bind(&event.title)
        .bind(event.date.format("%Y-%m-%d").to_string())
        .bind(&event.time)
        .bind(event.duration_minutes)
        .bind(&event.description)
        .bind(category_to_str(event.category))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AionError::Backend(e.to_string()))?;

        Ok(event)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AionError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
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
    async fn create_list_update_delete_round_trip() {
        let store = SqliteEventStore::connect_in_memory().await.unwrap();
        let date = ymd(2026, 2, 18);

        let created = store
            .create(NewEvent {
                title: "gym".into(),
                date,
                time: "09:00".into(),
                duration_minutes: 60,
                description: String::new(),
            })
            .await
            .unwrap();

        let listed = store.list(date).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);

        let updated = store
            .update(
                &created.id,
                EventChanges {
                    time: Some("10:00".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.time, "10:00");

        store.delete(&created.id).await.unwrap();
        assert!(store.list(date).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_range_is_inclusive_and_sorted() {
        let store = SqliteEventStore::connect_in_memory().await.unwrap();
        store
            .create(NewEvent {
                title: "a".into(),
                date: ymd(2026, 2, 18),
                time: "09:00".into(),
                duration_minutes: 30,
                description: String::new(),
            })
            .await
            .unwrap();
        store
            .create(NewEvent {
                title: "b".into(),
                date: ymd(2026, 2, 20),
                time: "09:00".into(),
                duration_minutes: 30,
                description: String::new(),
            })
            .await
            .unwrap();

        let events = store.list_range(ymd(2026, 2, 18), ymd(2026, 2, 20)).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "a");
        assert_eq!(events[1].title, "b");
    }

    #[tokio::test]
    async fn delete_unknown_id_is_not_found() {
        let store = SqliteEventStore::connect_in_memory().await.unwrap();
        assert!(matches!(store.delete("nope").await, Err(AionError::NotFound(_))));
    }
}
