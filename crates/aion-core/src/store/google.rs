//! The Google Calendar [`EventStore`] backend (C13). Talks to the user's
//! real `primary` calendar over the v3 REST API; refreshes an expired
//! access token once and retries before giving up.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::{json, Value};

use crate::config::{AppConfig, TokenRecord, TokenStore};
use crate::error::{AionError, Result};
use crate::event::{Category, Event, EventChanges, EventStore, NewEvent};

const BASE_URL: &str = "https://www.googleapis.com/calendar/v3/calendars/primary/events";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

pub struct GoogleCalendarStore {
    client: reqwest::Client,
    access_token: RwLock<String>,
    refresh_token: Option<String>,
    client_id: String,
    client_secret: String,
    timezone: String,
}

impl GoogleCalendarStore {
    /// Build a store from the persisted OAuth tokens and app config. Fails
    /// with [`AionError::AuthExpired`] if the user has never logged in.
    pub fn new(config: &AppConfig) -> Result<GoogleCalendarStore> {
        let tokens = TokenStore::load()?.ok_or(AionError::AuthExpired)?;
        Ok(GoogleCalendarStore {
            client: reqwest::Client::new(),
            access_token: RwLock::new(tokens.access_token),
            refresh_token: tokens.refresh_token,
            client_id: config.google_client_id.clone().unwrap_or_default(),
            client_secret: config.google_client_secret.clone().unwrap_or_default(),
            timezone: config.timezone.clone(),
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token.read().unwrap())
    }

    /// Refreshes the access token on a 401 response. Returns `Ok(true)` if
    /// the caller should retry the request once with the new token.
    async fn refresh_if_needed(&self, status: reqwest::StatusCode) -> Result<bool> {
        if status != reqwest::StatusCode::UNAUTHORIZED {
            return Ok(false);
        }
        let refresh_token = self.refresh_token.as_ref().ok_or(AionError::AuthExpired)?;

        let resp = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AionError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AionError::AuthExpired);
        }
        let data: Value = resp.json().await.map_err(|e| AionError::Network(e.to_string()))?;
        let new_token = data
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| AionError::Backend("refresh response missing access_token".to_string()))?
            .to_string();

        *self.access_token.write().unwrap() = new_token.clone();
        TokenStore::save(&TokenRecord {
            access_token: new_token,
            refresh_token: Some(refresh_token.clone()),
            expires_in: data.get("expires_in").and_then(Value::as_i64).unwrap_or(3600),
            token_type: data.get("token_type").and_then(Value::as_str).unwrap_or("Bearer").to_string(),
        })?;
        Ok(true)
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Value> {
        let mut resp = self
            .client
            .get(url)
            .query(query)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| AionError::Network(e.to_string()))?;
        if self.refresh_if_needed(resp.status()).await? {
            resp = self
                .client
                .get(url)
                .query(query)
                .header("Authorization", self.bearer())
                .send()
                .await
                .map_err(|e| AionError::Network(e.to_string()))?;
        }
        decode(resp).await
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value> {
        let mut resp = self
            .client
            .post(url)
            .json(body)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| AionError::Network(e.to_string()))?;
        if self.refresh_if_needed(resp.status()).await? {
            resp = self
                .client
                .post(url)
                .json(body)
                .header("Authorization", self.bearer())
                .send()
                .await
                .map_err(|e| AionError::Network(e.to_string()))?;
        }
        decode(resp).await
    }

    async fn put(&self, url: &str, body: &Value) -> Result<Value> {
        let mut resp = self
            .client
            .put(url)
            .json(body)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| AionError::Network(e.to_string()))?;
        if self.refresh_if_needed(resp.status()).await? {
            resp = self
                .client
                .put(url)
                .json(body)
                .header("Authorization", self.bearer())
                .send()
                .await
                .map_err(|e| AionError::Network(e.to_string()))?;
        }
        decode(resp).await
    }

    async fn delete_request(&self, url: &str) -> Result<()> {
        let mut resp = self
            .client
            .delete(url)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| AionError::Network(e.to_string()))?;
        if self.refresh_if_needed(resp.status()).await? {
            resp = self
                .client
                .delete(url)
                .header("Authorization", self.bearer())
                .send()
                .await
                .map_err(|e| AionError::Network(e.to_string()))?;
        }
        if !resp.status().is_success() {
            return Err(AionError::Backend(format!("google calendar returned {}", resp.status())));
        }
        Ok(())
    }
}

async fn decode(resp: reqwest::Response) -> Result<Value> {
    if !resp.status().is_success() {
        return Err(AionError::Backend(format!("google calendar returned {}", resp.status())));
    }
    resp.json().await.map_err(|e| AionError::Backend(e.to_string()))
}

/// RFC3339 with a colon in the UTC offset (e.g. `...-05:00`) isn't accepted
/// by `strptime`-style parsing without normalizing it to `-0500` first.
fn parse_rfc3339(s: &str) -> Option<NaiveDateTime> {
    let bytes = s.as_bytes();
    let normalized = if bytes.len() >= 6 && bytes[bytes.len() - 3] == b':' {
        let mut owned = s.to_string();
        owned.remove(owned.len() - 3);
        owned
    } else {
        s.to_string()
    };
    chrono::DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%z")
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(&s[..19.min(s.len())], "%Y-%m-%dT%H:%M:%S").ok())
}

/// Convert a Google Calendar API event into an [`Event`]. All-day events
/// (no `dateTime`, only a bare `date`) are skipped — they don't fit this
/// application's slot model.
fn parse_gcal_event(raw: &Value) -> Option<Event> {
    let start_str = raw.get("start")?.get("dateTime")?.as_str()?;
    let end_str = raw.get("end").and_then(|e| e.get("dateTime")).and_then(Value::as_str).unwrap_or(start_str);

    let start = parse_rfc3339(start_str)?;
    let end = parse_rfc3339(end_str)?;
    let duration = ((end - start).num_minutes()).max(15);

    Some(Event {
        id: raw.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
        title: raw.get("summary").and_then(Value::as_str).unwrap_or("(no title)").to_string(),
        date: start.date(),
        time: start.format("%H:%M").to_string(),
        duration_minutes: duration,
        description: raw.get("description").and_then(Value::as_str).unwrap_or_default().to_string(),
        category: Category::Other,
    })
}

fn items_of(response: &Value) -> Vec<Event> {
    response
        .get("items")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(parse_gcal_event)
        .collect()
}

fn day_bounds(date: NaiveDate) -> (String, String) {
    let start = date.format("%Y-%m-%dT00:00:00").to_string();
    let end = (date + Duration::days(1)).format("%Y-%m-%dT00:00:00").to_string();
    (start, end)
}

#[async_trait]
impl EventStore for GoogleCalendarStore {
    async fn list(&self, date: NaiveDate) -> Result<Vec<Event>> {
        let (time_min, time_max) = day_bounds(date);
        let response = self
            .get(
                BASE_URL,
                &[
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                    ("maxResults", "100"),
                    ("timeZone", &self.timezone),
                    ("timeMin", &time_min),
                    ("timeMax", &time_max),
                ],
            )
            .await?;
        // The API pads the query window; re-filter to the exact date.
        Ok(items_of(&response).into_iter().filter(|e| e.date == date).collect())
    }

    async fn list_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Event>> {
        let time_min = start.format("%Y-%m-%dT00:00:00").to_string();
        let time_max = (end + Duration::days(1)).format("%Y-%m-%dT00:00:00").to_string();
        let response = self
            .get(
                BASE_URL,
                &[
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                    ("maxResults", "250"),
                    ("timeZone", &self.timezone),
                    ("timeMin", &time_min),
                    ("timeMax", &time_max),
                ],
            )
            .await?;
        Ok(items_of(&response).into_iter().filter(|e| e.date >= start && e.date <= end).collect())
    }

    async fn create(&self, new_event: NewEvent) -> Result<Event> {
        if !new_event.fits_in_one_day()? {
            return Err(AionError::InvalidTime(format!(
                "{} for {} minutes runs past midnight",
                new_event.time, new_event.duration_minutes
            )));
        }
        let start = format!("{}T{}:00", new_event.date.format("%Y-%m-%d"), new_event.time);
        let start_dt = NaiveDateTime::parse_from_str(&start, "%Y-%m-%dT%H:%M:%S")
            .map_err(|e| AionError::Backend(e.to_string()))?;
        let end_dt = start_dt + Duration::minutes(new_event.duration_minutes);

        let body = json!({
            "summary": new_event.title,
            "description": new_event.description,
            "start": {"dateTime": start_dt.format("%Y-%m-%dT%H:%M:%S").to_string(), "timeZone": self.timezone},
            "end": {"dateTime": end_dt.format("%Y-%m-%dT%H:%M:%S").to_string(), "timeZone": self.timezone},
        });

        let response = self.post(BASE_URL, &body).await?;
        let id = response.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
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
        let url = format!("{BASE_URL}/{id}");
        let mut current = self.get(&url, &[]).await?;

        if let Some(title) = &changes.title {
            current["summary"] = json!(title);
        }
        if let Some(description) = &changes.description {
            current["description"] = json!(description);
        }
        if changes.date.is_some() || changes.time.is_some() {
            let existing_start = current.get("start").and_then(|s| s.get("dateTime")).and_then(Value::as_str).unwrap_or("");
            let date = changes
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| existing_start.get(0..10).unwrap_or("").to_string());
            let time = changes.time.clone().unwrap_or_else(|| existing_start.get(11..16).unwrap_or("").to_string());
            let duration = changes.duration_minutes.unwrap_or(60);

            let start = format!("{date}T{time}:00");
            let start_dt =
                NaiveDateTime::parse_from_str(&start, "%Y-%m-%dT%H:%M:%S").map_err(|e| AionError::Backend(e.to_string()))?;
            let end_dt = start_dt + Duration::minutes(duration);
            current["start"] = json!({"dateTime": start_dt.format("%Y-%m-%dT%H:%M:%S").to_string(), "timeZone": self.timezone});
            current["end"] = json!({"dateTime": end_dt.format("%Y-%m-%dT%H:%M:%S").to_string(), "timeZone": self.timezone});
        }

        let response = self.put(&url, &current).await?;
        parse_gcal_event(&response).ok_or_else(|| AionError::Backend("updated event is an all-day event".to_string()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.delete_request(&format!("{BASE_URL}/{id}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_offset_with_colon() {
        let dt = parse_rfc3339("2026-02-16T09:00:00-05:00").unwrap();
        assert_eq!(dt.format("%H:%M").to_string(), "14:00");
    }

    #[test]
    fn all_day_event_is_skipped() {
        let raw = json!({"id": "e1", "summary": "holiday", "start": {"date": "2026-02-16"}});
        assert!(parse_gcal_event(&raw).is_none());
    }

    #[test]
    fn timed_event_parses_title_and_duration() {
        let raw = json!({
            "id": "e1",
            "summary": "gym",
            "start": {"dateTime": "2026-02-16T09:00:00Z"},
            "end": {"dateTime": "2026-02-16T10:00:00Z"},
        });
        let event = parse_gcal_event(&raw).unwrap();
        assert_eq!(event.title, "gym");
        assert_eq!(event.time, "09:00");
        assert_eq!(event.duration_minutes, 60);
    }
}
