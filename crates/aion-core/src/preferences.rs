//! The Preference Store: user-defined blocked windows and time-of-day bias,
//! persisted as JSON alongside the rest of the account's config.
//!
//! Blocked windows never delete themselves; they simply stop being visible
//! to readers once their `until` date has passed. The on-disk file is the
//! source of truth and is never mutated implicitly by a read.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBias {
    Morning,
    Afternoon,
    Evening,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedWindow {
    pub label: String,
    pub days: BTreeSet<String>,
    pub start: String,
    pub end: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<NaiveDate>,
}

impl BlockedWindow {
    pub fn validate(&self) -> Result<()> {
        let start = crate::slots::slot_of(&self.start)?;
        let end_slot = crate::slots::slot_of(&self.end)?;
        if end_slot <= start {
            return Err(AionError::InvalidTime(format!(
                "blocked window '{}' has end <= start",
                self.label
            )));
        }
        Ok(())
    }

    pub fn applies_on(&self, weekday: &str, today: NaiveDate, date: NaiveDate) -> bool {
        if !self.days.contains(weekday) {
            return false;
        }
        match self.until {
            Some(until) if until < today => false,
            _ => {
                let _ = date; // window applies to any date matching the weekday, regardless of `date` itself
                true
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    pub blocked_windows: Vec<BlockedWindow>,
    pub default_time_bias: Option<TimeBias>,
    #[serde(default = "default_true")]
    pub nl_parser_enabled: bool,
}

fn default_true() -> bool {
    true
}

/// On-disk envelope matching the persisted preference file layout.
#[derive(Debug, Serialize, Deserialize)]
struct PreferenceFile {
    preferences: PreferenceFileInner,
    nl_parser_enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct PreferenceFileInner {
    blocked_slots: Vec<BlockedWindow>,
    default_time_pref: Option<TimeBias>,
}

impl Preferences {
    pub fn load(path: &Path) -> Result<Preferences> {
        if !path.exists() {
            return Ok(Preferences::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AionError::Config(format!("reading {}: {e}", path.display())))?;
        let file: PreferenceFile = serde_json::from_str(&raw)
            .map_err(|e| AionError::Config(format!("parsing {}: {e}", path.display())))?;
        Ok(Preferences {
            blocked_windows: file.preferences.blocked_slots,
            default_time_bias: file.preferences.default_time_pref,
            nl_parser_enabled: file.nl_parser_enabled,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = PreferenceFile {
            preferences: PreferenceFileInner {
                blocked_slots: self.blocked_windows.clone(),
                default_time_pref: self.default_time_bias,
            },
            nl_parser_enabled: self.nl_parser_enabled,
        };
        let body = serde_json::to_string_pretty(&file)
            .map_err(|e| AionError::Config(format!("serializing preferences: {e}")))?;
        write_atomic(path, &body)
    }

    /// Blocked windows still in effect as of `today`, filtering out any
    /// whose `until` has passed.
    pub fn active_windows(&self, today: NaiveDate) -> Vec<&BlockedWindow> {
        self.blocked_windows
            .iter()
            .filter(|w| match w.until {
                Some(until) => until >= today,
                None => true,
            })
            .collect()
    }
}

fn write_atomic(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AionError::Config(format!("creating {}: {e}", parent.display())))?;
    }
    let tmp: PathBuf = path.with_extension("tmp");
    std::fs::write(&tmp, body).map_err(|e| AionError::Config(format!("writing {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path).map_err(|e| AionError::Config(format!("renaming {}: {e}", tmp.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn window(label: &str, until: Option<NaiveDate>) -> BlockedWindow {
        BlockedWindow {
            label: label.to_string(),
            days: BTreeSet::from(["monday".to_string()]),
            start: "09:00".to_string(),
            end: "10:00".to_string(),
            until,
        }
    }

    #[test]
    fn expired_window_is_filtered_on_read() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 18).unwrap();
        let prefs = Preferences {
            blocked_windows: vec![
                window("expired", Some(today - chrono::Duration::days(1))),
                window("active", Some(today + chrono::Duration::days(1))),
                window("forever", None),
            ],
            default_time_bias: None,
            nl_parser_enabled: true,
        };
        let active = prefs.active_windows(today);
        let labels: Vec<&str> = active.iter().map(|w| w.label.as_str()).collect();
        assert_eq!(labels, vec!["active", "forever"]);
    }

    #[test]
    fn validate_rejects_end_before_start() {
        let mut w = window("bad", None);
        w.end = "08:00".to_string();
        assert!(w.validate().is_err());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        let mut prefs = Preferences::default();
        prefs.blocked_windows.push(window("gym block", None));
        prefs.default_time_bias = Some(TimeBias::Morning);
        prefs.save(&path).unwrap();

        let loaded = Preferences::load(&path).unwrap();
        assert_eq!(loaded.blocked_windows.len(), 1);
        assert_eq!(loaded.blocked_windows[0].label, "gym block");
        assert!(matches!(loaded.default_time_bias, Some(TimeBias::Morning)));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let prefs = Preferences::load(&path).unwrap();
        assert!(prefs.blocked_windows.is_empty());
        assert!(prefs.nl_parser_enabled);
    }
}
