//! The Ollama-backed [`NLParser`] (C5). Reachability is cached per
//! process the same way the source's module-level `_ollama_status` is,
//! so a down Ollama daemon costs one failed probe, not one per keystroke.

use std::sync::{OnceLock, RwLock};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Datelike, Duration, Local, NaiveDate};
use serde_json::Value;

use crate::dates::{self, DateKind};
use crate::error::{AionError, Result};
use crate::event::Event;
use crate::intent::rule_parser::extract_time;
use crate::intent::{Command, CommandIntent, NLParser};
use crate::preferences::TimeBias;

const VALID_INTENTS: &[&str] = &["SCHEDULE", "LIST", "DELETE", "UPDATE", "FIND_FREE", "FIND_OPTIMAL"];

static OLLAMA_STATUS: OnceLock<RwLock<Option<bool>>> = OnceLock::new();

/// Forces the next [`OllamaParser::is_available`] call to re-probe
/// instead of trusting the cached result.
pub fn reset_status() {
    if let Some(cache) = OLLAMA_STATUS.get() {
        *cache.write().unwrap() = None;
    }
}

pub struct OllamaParser {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaParser {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> OllamaParser {
        OllamaParser {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    fn prompt(&self, user_input: &str, events: &[Event]) -> String {
        let now = Local::now();
        let today = now.format("%Y-%m-%d");
        let weekday = now.format("%A");

        let summary = if events.is_empty() {
            "(no events loaded)".to_string()
        } else {
            events
                .iter()
                .take(20)
                .map(|e| format!("- {} {}: {} ({}min)", e.date, e.time, e.title, e.duration_minutes))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            r#"You are a calendar command parser. Today is {today} ({weekday}).

Intents:
- LIST = user wants to SEE/VIEW events ("what tomorrow?", "what I have today", "show my calendar")
- SCHEDULE = user wants to CREATE/ADD a new event ("schedule gym at 3pm", "add meeting tomorrow")
- DELETE = user wants to REMOVE an event ("cancel gym", "delete meeting")
- UPDATE = user wants to CHANGE an event ("move gym to 3pm", "reschedule meeting")
- FIND_FREE = user wants to see AVAILABLE/FREE time slots ("when am I free?")
- FIND_OPTIMAL = user wants a SUGGESTED time ("best time for study?")

If the user is issuing a SINGLE command, return an array with one object.
If the user is issuing MULTIPLE commands (e.g. "schedule gym today AND study tomorrow"),
return an array with one object per command.

User command: "{user_input}"

Current events:
{summary}

Respond ONLY with a valid JSON array (no markdown, no explanation):
[
  {{
    "intent": "SCHEDULE|LIST|DELETE|UPDATE|FIND_FREE|FIND_OPTIMAL",
    "activity": "event title or null",
    "date": "relative phrase the user said (today/tomorrow/monday/next week/etc.) or YYYY-MM-DD if an explicit date was given, or null",
    "date_end": "YYYY-MM-DD for explicit date ranges only, otherwise null",
    "time": "HH:MM in 24-hour format or null",
    "duration": "minutes as integer or null",
    "time_pref": "morning|afternoon|evening|null"
  }}
]"#
        )
    }
}

#[async_trait]
impl NLParser for OllamaParser {
    async fn is_available(&self) -> bool {
        let cache = OLLAMA_STATUS.get_or_init(|| RwLock::new(None));
        if let Some(status) = *cache.read().unwrap() {
            return status;
        }
        let reachable = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(StdDuration::from_secs(2))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false);
        *cache.write().unwrap() = Some(reachable);
        reachable
    }

    async fn parse(&self, text: &str, events: &[Event]) -> Result<Vec<Command>> {
        if !self.is_available().await {
            return Err(AionError::ParserUnavailable);
        }

        let body = serde_json::json!({
            "model": self.model,
            "prompt": self.prompt(text, events),
            "stream": false,
            "options": {"temperature": 0.1},
        });

        let resp = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .timeout(StdDuration::from_secs(30))
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "ollama request failed, treating as unavailable");
                AionError::ParserUnavailable
            })?;

        if !resp.status().is_success() {
            tracing::debug!(status = %resp.status(), "ollama returned non-success status, treating as unavailable");
            return Err(AionError::ParserUnavailable);
        }

        let envelope: Value = resp.json().await.map_err(|e| AionError::ParserDecode(e.to_string()))?;
        let raw_response = envelope
            .get("response")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();

        let stripped = strip_code_fence(raw_response);
        let parsed: Value =
            serde_json::from_str(stripped).map_err(|e| AionError::ParserDecode(e.to_string()))?;

        let items: Vec<Value> = match parsed {
            Value::Array(items) => items,
            object @ Value::Object(_) => vec![object],
            _ => return Err(AionError::ParserDecode("expected a JSON array or object".to_string())),
        };

        Ok(items
            .into_iter()
            .map(|item| build_command(&item, text, Local::now().date_naive()))
            .collect())
    }
}

fn strip_code_fence(text: &str) -> &str {
    if !text.contains("```") {
        return text;
    }
    let mut parts = text.splitn(3, "```");
    parts.next();
    let inner = parts.next().unwrap_or(text).trim();
    inner.strip_prefix("json").map(str::trim).unwrap_or(inner)
}

fn clean_str(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => {
            let lowered = s.trim().to_lowercase();
            if lowered.is_empty() || lowered == "null" || lowered == "none" {
                None
            } else {
                Some(s.trim().to_string())
            }
        }
        _ => None,
    }
}

fn clean_duration(value: &Value) -> Option<i64> {
    match value.get("duration")? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn clean_time_bias(value: &Value) -> Option<TimeBias> {
    clean_str(value, "time_pref").and_then(|pref| match pref.to_lowercase().as_str() {
        "morning" => Some(TimeBias::Morning),
        "afternoon" => Some(TimeBias::Afternoon),
        "evening" | "night" => Some(TimeBias::Evening),
        _ => None,
    })
}

/// Resolve the LLM's `date`/`date_end` fields. We never let the model do
/// date arithmetic itself (small models get it wrong); relative phrases
/// go through the same resolver the rule parser uses, and only an
/// explicit ISO string is parsed directly.
fn resolve_llm_dates(date_str: &str, date_end_str: Option<&str>, today: NaiveDate) -> (Vec<NaiveDate>, String) {
    let resolution = dates::resolve(date_str, today);
    if resolution.kind != DateKind::None {
        return (resolution.dates, resolution.label);
    }

    if let Ok(start) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        if let Some(end_str) = date_end_str {
            if let Ok(end) = NaiveDate::parse_from_str(end_str, "%Y-%m-%d") {
                let span = (end - start).num_days();
                if span >= 0 {
                    let dates = (0..=span).map(|i| start + Duration::days(i)).collect();
                    let label = format!("{} \u{2013} {}", start.format("%b %d"), end.format("%b %d"));
                    return (dates, label);
                }
            }
        }
        return (vec![start], start.format("%A, %B %d").to_string());
    }

    (Vec::new(), date_str.to_string())
}

fn build_command(item: &Value, raw: &str, today: NaiveDate) -> Command {
    let intent_name = item
        .get("intent")
        .and_then(Value::as_str)
        .map(|s| s.to_uppercase())
        .filter(|s| VALID_INTENTS.contains(&s.as_str()))
        .unwrap_or_else(|| "UNKNOWN".to_string());

    let activity = clean_str(item, "activity");
    let date_str = clean_str(item, "date");
    let date_end_str = clean_str(item, "date_end");
    let time = clean_str(item, "time").or_else(|| extract_time(raw));
    let duration_minutes = clean_duration(item);
    let time_bias = clean_time_bias(item);

    let (dates, date_label) = match date_str {
        Some(ref d) => resolve_llm_dates(d, date_end_str.as_deref(), today),
        None => (Vec::new(), String::new()),
    };

    let intent = match intent_name.as_str() {
        "SCHEDULE" => CommandIntent::Schedule {
            activity: activity.unwrap_or_default(),
            label: None,
            dates,
            date_label,
            time,
            duration_minutes,
            time_bias,
        },
        "LIST" => CommandIntent::List { dates, date_label },
        "DELETE" => CommandIntent::Delete { activity, label: None, dates },
        "UPDATE" => CommandIntent::Update {
            activity,
            label: None,
            dates,
            time,
            duration_minutes,
        },
        "FIND_FREE" => CommandIntent::FindFree { dates, duration_minutes },
        "FIND_OPTIMAL" => CommandIntent::FindOptimal {
            activity: activity.unwrap_or_default(),
            dates,
            duration_minutes,
            time_bias,
        },
        _ => CommandIntent::Unknown,
    };

    Command {
        intent,
        confidence: 0.95,
        raw: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let text = "```json\n[{\"intent\": \"LIST\"}]\n```";
        assert_eq!(strip_code_fence(text), "[{\"intent\": \"LIST\"}]");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fence("[{\"intent\": \"LIST\"}]"), "[{\"intent\": \"LIST\"}]");
    }

    #[test]
    fn clean_str_normalizes_null_like_strings() {
        let item = serde_json::json!({"activity": "null", "time": "09:00"});
        assert_eq!(clean_str(&item, "activity"), None);
        assert_eq!(clean_str(&item, "time"), Some("09:00".to_string()));
    }

    #[test]
    fn build_command_falls_back_to_regex_time() {
        let item = serde_json::json!({"intent": "schedule", "activity": "gym", "time": null});
        let cmd = build_command(&item, "schedule gym at 9", NaiveDate::from_ymd_opt(2026, 2, 18).unwrap());
        match cmd.intent {
            CommandIntent::Schedule { time, .. } => assert_eq!(time.as_deref(), Some("09:00")),
            other => panic!("unexpected intent: {other:?}"),
        }
    }

    #[test]
    fn unrecognized_intent_becomes_unknown() {
        let item = serde_json::json!({"intent": "FROBNICATE"});
        let cmd = build_command(&item, "blah", NaiveDate::from_ymd_opt(2026, 2, 18).unwrap());
        assert!(matches!(cmd.intent, CommandIntent::Unknown));
    }
}
