//! `aion settings` / the interactive `preferences` verb — the preference
//! editor (C15), grounded in the teacher's `settings --show`/`--set`/
//! interactive-menu pattern.

use std::collections::BTreeSet;
use std::path::Path;

use aion_core::preferences::{BlockedWindow, Preferences, TimeBias};
use anyhow::{bail, Context, Result};
use dialoguer::{Confirm, Input, Select};

use crate::display;

/// Track whether anything actually changed, so we don't write the file
/// (and don't print "saved") on a no-op editing session.
#[derive(Default)]
struct ChangeTracker {
    changed: bool,
}

impl ChangeTracker {
    fn mark(&mut self) {
        self.changed = true;
    }
}

pub fn show(prefs: &Preferences, ollama_enabled: bool, today: chrono::NaiveDate) {
    display::preferences(prefs, ollama_enabled, today);
}

/// `--set KEY=VALUE`, for scripting. Supported keys: `default_time_bias`
/// (`morning|afternoon|evening|none`) and `nl_parser_enabled` (`true|false`).
pub fn set_direct(prefs: &mut Preferences, kv: &str, path: &Path) -> Result<()> {
    let (key, value) = kv.split_once('=').with_context(|| format!("expected KEY=VALUE, got '{kv}'"))?;
    match key.trim() {
        "default_time_bias" => {
            prefs.default_time_bias = match value.trim().to_lowercase().as_str() {
                "morning" => Some(TimeBias::Morning),
                "afternoon" => Some(TimeBias::Afternoon),
                "evening" => Some(TimeBias::Evening),
                "none" | "" => None,
                other => bail!("unknown time bias '{other}'"),
            };
        }
        "nl_parser_enabled" => {
            prefs.nl_parser_enabled = value.trim().parse().with_context(|| format!("expected true/false, got '{value}'"))?;
        }
        other => bail!("unknown setting '{other}'"),
    }
    prefs.save(path)?;
    display::success(&format!("Set {key} = {value}."));
    Ok(())
}

fn add_blocked_window(prefs: &mut Preferences, tracker: &mut ChangeTracker) -> Result<()> {
    let label: String = Input::new().with_prompt("Label").default("Blocked".to_string()).interact_text()?;
    let days_raw: String = Input::new().with_prompt("Days, comma-separated (e.g. monday,tuesday or weekdays/weekends/every day)").interact_text()?;
    let days = parse_days(&days_raw);
    if days.is_empty() {
        display::error("No valid days entered; window not added.");
        return Ok(());
    }
    let start: String = Input::new().with_prompt("Start time (HH:MM)").interact_text()?;
    let end: String = Input::new().with_prompt("End time (HH:MM)").interact_text()?;
    let has_until = Confirm::new().with_prompt("Expire on a specific date?").default(false).interact()?;
    let until = if has_until {
        let raw: String = Input::new().with_prompt("Until (YYYY-MM-DD)").interact_text()?;
        Some(chrono::NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").with_context(|| format!("invalid date '{raw}'"))?)
    } else {
        None
    };

    let window = BlockedWindow { label, days, start, end, until };
    window.validate()?;
    prefs.blocked_windows.push(window);
    tracker.mark();
    display::success("Blocked window added.");
    Ok(())
}

fn parse_days(raw: &str) -> BTreeSet<String> {
    let lowered = raw.trim().to_lowercase();
    match lowered.as_str() {
        "weekdays" => return ["monday", "tuesday", "wednesday", "thursday", "friday"].iter().map(|s| s.to_string()).collect(),
        "weekends" => return ["saturday", "sunday"].iter().map(|s| s.to_string()).collect(),
        "every day" | "everyday" | "daily" => {
            return ["monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        }
        _ => {}
    }
    const NAMES: &[&str] = &["monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday"];
    lowered
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| NAMES.iter().find(|n| n.starts_with(s)).map(|n| n.to_string()))
        .collect()
}

fn remove_blocked_window(prefs: &mut Preferences, tracker: &mut ChangeTracker) -> Result<()> {
    if prefs.blocked_windows.is_empty() {
        display::info("No blocked windows to remove.");
        return Ok(());
    }
    let options: Vec<String> = prefs.blocked_windows.iter().map(|w| format!("{} ({} {}-{})", w.label, w.days.len(), w.start, w.end)).collect();
    let Some(index) = Select::new().with_prompt("Remove which window?").items(&options).interact_opt()? else {
        return Ok(());
    };
    prefs.blocked_windows.remove(index);
    tracker.mark();
    display::success("Blocked window removed.");
    Ok(())
}

fn set_default_bias(prefs: &mut Preferences, tracker: &mut ChangeTracker) -> Result<()> {
    let options = ["Morning", "Afternoon", "Evening", "No preference"];
    let choice = Select::new().with_prompt("Default time preference").items(&options).default(3).interact()?;
    prefs.default_time_bias = match choice {
        0 => Some(TimeBias::Morning),
        1 => Some(TimeBias::Afternoon),
        2 => Some(TimeBias::Evening),
        _ => None,
    };
    tracker.mark();
    Ok(())
}

fn toggle_ollama(prefs: &mut Preferences, tracker: &mut ChangeTracker) -> Result<()> {
    prefs.nl_parser_enabled = Confirm::new().with_prompt("Enable smart command understanding (Ollama)?").default(prefs.nl_parser_enabled).interact()?;
    tracker.mark();
    Ok(())
}

/// The interactive category menu, looping until the user picks "Done".
pub fn interactive_menu(prefs: &mut Preferences, path: &Path) -> Result<()> {
    let mut tracker = ChangeTracker::default();
    loop {
        let options = [
            "Add a blocked time window",
            "Remove a blocked time window",
            "Set default time preference",
            "Toggle smart commands (Ollama)",
            "Done",
        ];
        let choice = Select::new().with_prompt("Preferences").items(&options).default(4).interact()?;
        match choice {
            0 => add_blocked_window(prefs, &mut tracker)?,
            1 => remove_blocked_window(prefs, &mut tracker)?,
            2 => set_default_bias(prefs, &mut tracker)?,
            3 => toggle_ollama(prefs, &mut tracker)?,
            _ => break,
        }
    }

    if tracker.changed {
        prefs.save(path)?;
        display::success("Preferences saved.");
    } else {
        display::info("No changes made.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_days_recognizes_aliases() {
        assert_eq!(parse_days("weekdays").len(), 5);
        assert_eq!(parse_days("weekends").len(), 2);
        assert_eq!(parse_days("every day").len(), 7);
        assert_eq!(parse_days("mon, wed").len(), 2);
    }

    #[test]
    fn set_direct_rejects_malformed_input() {
        let mut prefs = Preferences::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        assert!(set_direct(&mut prefs, "no-equals-sign", &path).is_err());
        assert!(set_direct(&mut prefs, "default_time_bias=nonsense", &path).is_err());
    }

    #[test]
    fn set_direct_updates_and_persists() {
        let mut prefs = Preferences::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        set_direct(&mut prefs, "default_time_bias=morning", &path).unwrap();
        assert_eq!(prefs.default_time_bias, Some(TimeBias::Morning));
        let reloaded = Preferences::load(&path).unwrap();
        assert_eq!(reloaded.default_time_bias, Some(TimeBias::Morning));
    }
}
