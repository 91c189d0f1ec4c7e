//! The typed command record the Intent Pipeline produces, and the two
//! parsers (C5 external, C6 offline) that can produce it.

pub mod nl_parser;
pub mod ollama;
pub mod pipeline;
pub mod rule_parser;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::preferences::TimeBias;

/// Per-intent payload. Carrying only the fields that make sense for each
/// intent (rather than one struct with every field optional) is a
/// deliberate divergence from the source's dynamic dict-of-fields shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandIntent {
    Schedule {
        activity: String,
        label: Option<String>,
        dates: Vec<NaiveDate>,
        date_label: String,
        time: Option<String>,
        duration_minutes: Option<i64>,
        time_bias: Option<TimeBias>,
    },
    List {
        dates: Vec<NaiveDate>,
        date_label: String,
    },
    Delete {
        activity: Option<String>,
        label: Option<String>,
        dates: Vec<NaiveDate>,
    },
    Update {
        activity: Option<String>,
        label: Option<String>,
        dates: Vec<NaiveDate>,
        time: Option<String>,
        duration_minutes: Option<i64>,
    },
    FindFree {
        dates: Vec<NaiveDate>,
        duration_minutes: Option<i64>,
    },
    FindOptimal {
        activity: String,
        dates: Vec<NaiveDate>,
        duration_minutes: Option<i64>,
        time_bias: Option<TimeBias>,
    },
    Help,
    Preferences,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub intent: CommandIntent,
    pub confidence: f64,
    pub raw: String,
}

impl Command {
    /// The effective event title: the custom label if the user gave one,
    /// otherwise the bare activity. Only meaningful for Schedule/Delete/
    /// Update commands.
    pub fn title(&self) -> Option<String> {
        match &self.intent {
            CommandIntent::Schedule { activity, label, .. } => {
                Some(label.clone().unwrap_or_else(|| activity.clone()))
            }
            CommandIntent::Delete { activity, label, .. }
            | CommandIntent::Update { activity, label, .. } => {
                label.clone().or_else(|| activity.clone())
            }
            _ => None,
        }
    }

    pub fn unknown(raw: impl Into<String>, confidence: f64) -> Command {
        Command {
            intent: CommandIntent::Unknown,
            confidence,
            raw: raw.into(),
        }
    }
}
