//! Terminal Presentation (C15): human-readable rendering of dispatcher
//! output, grounded in the original's `display.py` and reimplemented in
//! the `console`-colored, `eprintln`-based texture the rest of this CLI's
//! teacher uses for interactive commands.

use std::collections::BTreeSet;

use aion_core::dispatcher::DispatchOutcome;
use aion_core::event::Event;
use aion_core::preferences::Preferences;
use aion_core::solver::{FreeInterval, SlotSolution};
use chrono::NaiveDate;
use console::Style;

pub fn banner() {
    let bold = Style::new().bold();
    let cyan = Style::new().cyan().bold();
    eprintln!();
    eprintln!("{} — AI Calendar Agent", cyan.apply_to("Aion"));
    eprintln!(
        "Type {} for commands, {} to configure, {} to exit",
        bold.apply_to("help"),
        bold.apply_to("preferences"),
        bold.apply_to("quit"),
    );
    eprintln!();
}

pub fn status_line(gcal_connected: bool, ollama_available: bool, ollama_enabled: bool, ollama_model: &str, timezone: &str) {
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();
    let yellow = Style::new().yellow().bold();
    let bold = Style::new().bold();

    if gcal_connected {
        eprintln!("  Google Calendar: {}", green.apply_to("Connected"));
    } else {
        eprintln!("  Google Calendar: {} (run: login)", red.apply_to("Not logged in"));
    }

    let model_label = if ollama_model.is_empty() { String::new() } else { format!(" ({ollama_model})") };
    if ollama_available && ollama_enabled {
        eprintln!("  Ollama{model_label}: {}", green.apply_to("Available"));
    } else if ollama_available && !ollama_enabled {
        eprintln!("  Ollama{model_label}: {} (type preferences to re-enable)", yellow.apply_to("Disabled"));
    } else {
        eprintln!("  Ollama: {} (type setup to enable smart commands)", yellow.apply_to("Not running"));
    }
    eprintln!("  Timezone: {}", bold.apply_to(timezone));
    eprintln!();
}

pub fn help() {
    let bold = Style::new().bold();
    eprintln!("{}", bold.apply_to("Commands"));
    let rows: &[(&str, &str)] = &[
        ("Schedule", "\"schedule gym tomorrow morning\", \"add meeting at 3pm\""),
        ("List", "\"what's on today?\", \"show my calendar this week\""),
        ("Delete", "\"cancel gym tomorrow\", \"delete meeting\""),
        ("Update", "\"move gym to 3pm\", \"reschedule meeting to friday\""),
        ("Free slots", "\"when am I free tomorrow?\", \"free slots this week\""),
        ("Best time", "\"best time for a 2h study session\""),
        ("Login", "\"login\" — connect Google Calendar"),
        ("Logout", "\"logout\" — disconnect Google Calendar"),
        ("Preferences", "\"preferences\" — blocked times & defaults"),
        ("Setup", "\"setup\" — enable smart command understanding (Ollama)"),
        ("Quit", "\"quit\" or \"exit\""),
    ];
    for (action, example) in rows {
        eprintln!("  {:<12} {}", bold.apply_to(action), example);
    }
    eprintln!();
}

pub fn events(events: &[Event], label: &str) {
    if events.is_empty() {
        if label.is_empty() {
            eprintln!("  No events.");
        } else {
            eprintln!("  No events for {label}.");
        }
        return;
    }

    let bold = Style::new().bold();
    let dim = Style::new().dim();
    let cyan = Style::new().cyan();
    if label.is_empty() {
        eprintln!("{}", bold.apply_to("Events"));
    } else {
        eprintln!("{}", bold.apply_to(format!("Events — {label}")));
    }

    let mut current_date: Option<NaiveDate> = None;
    for event in events {
        let date_display = if current_date != Some(event.date) {
            current_date = Some(event.date);
            event.date.format("%a %b %d").to_string()
        } else {
            String::new()
        };
        eprintln!(
            "  {:<10} {:<7} {:<30} {}",
            dim.apply_to(date_display),
            bold.apply_to(&event.time),
            cyan.apply_to(&event.title),
            format!("{} min", event.duration_minutes),
        );
    }
    eprintln!();
}

pub fn free_intervals(intervals: &[FreeInterval], label: &str) {
    if intervals.is_empty() {
        eprintln!("  No free slots found.");
        return;
    }
    let bold = Style::new().bold();
    let green = Style::new().green();
    if label.is_empty() {
        eprintln!("\n  {}", bold.apply_to("Free slots"));
    } else {
        eprintln!("\n  {}", bold.apply_to(format!("Free slots — {label}")));
    }
    for interval in intervals {
        eprintln!(
            "  {} {} — {} ({} min)",
            green.apply_to("\u{2022}"),
            interval.start,
            interval.end,
            interval.duration_minutes,
        );
    }
    eprintln!();
}

pub fn solution(solution: &SlotSolution) {
    let bold = Style::new().green().bold();
    eprintln!("\n  {} {} ({} min)", bold.apply_to("Best slot:"), solution.time, solution.duration_minutes);
    eprintln!("  Date: {}", solution.date.format("%A, %B %d"));
    eprintln!();
}

pub fn success(msg: &str) {
    let check = Style::new().green().bold();
    eprintln!("  {} {msg}", check.apply_to("\u{2714}"));
}

pub fn error(msg: &str) {
    let cross = Style::new().red().bold();
    eprintln!("  {} {msg}", cross.apply_to("\u{2716}"));
}

pub fn info(msg: &str) {
    let dim = Style::new().dim();
    eprintln!("  {} {msg}", dim.apply_to("\u{2139}"));
}

const ALL_DAYS: [&str; 7] = ["monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday"];
const WEEKDAYS: [&str; 5] = ["monday", "tuesday", "wednesday", "thursday", "friday"];
const WEEKENDS: [&str; 2] = ["saturday", "sunday"];

/// "Every day" / "Weekdays" / "Weekends" for the canonical sets, otherwise
/// an abbreviated comma list in the window's own day order.
fn days_label(days: &BTreeSet<String>) -> String {
    let all: BTreeSet<String> = ALL_DAYS.iter().map(|s| s.to_string()).collect();
    let weekdays: BTreeSet<String> = WEEKDAYS.iter().map(|s| s.to_string()).collect();
    let weekends: BTreeSet<String> = WEEKENDS.iter().map(|s| s.to_string()).collect();

    if *days == all {
        "Every day".to_string()
    } else if *days == weekdays {
        "Weekdays".to_string()
    } else if *days == weekends {
        "Weekends".to_string()
    } else {
        days.iter()
            .map(|d| {
                let mut chars = d.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str().get(..2).unwrap_or(""),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn preferences(prefs: &Preferences, ollama_enabled: bool, today: NaiveDate) {
    let bold = Style::new().bold();
    let green = Style::new().green();
    let yellow = Style::new().yellow();

    let state = if ollama_enabled { green.apply_to("On").to_string() } else { yellow.apply_to("Off").to_string() };
    eprintln!("  Smart commands (Ollama): {state}");

    let active = prefs.active_windows(today);
    if active.is_empty() && prefs.default_time_bias.is_none() {
        eprintln!();
        return;
    }

    if !active.is_empty() {
        eprintln!("{}", bold.apply_to("\nPreferences"));
        for (i, window) in active.iter().enumerate() {
            let until_label = window.until.map(|d| d.format("%b %d").to_string()).unwrap_or_else(|| "Always".to_string());
            eprintln!(
                "  {:>2}  {:<16} {:<12} {:<13} {}",
                i + 1,
                window.label,
                days_label(&window.days),
                format!("{} - {}", window.start, window.end),
                until_label,
            );
        }
    }

    if let Some(bias) = prefs.default_time_bias {
        eprintln!("\n  Default time preference: {}", bold.apply_to(format!("{bias:?}").to_lowercase()));
    }
    eprintln!();
}

/// Convert a dispatch outcome to a JSON value for `--json` output.
pub fn to_json(outcome: &DispatchOutcome) -> serde_json::Value {
    use serde_json::json;
    match outcome {
        DispatchOutcome::Scheduled(event) => json!({"status": "scheduled", "event": event}),
        DispatchOutcome::Listed(events) => json!({"status": "listed", "events": events}),
        DispatchOutcome::Deleted(event) => json!({"status": "deleted", "event": event}),
        DispatchOutcome::Updated(event) => json!({"status": "updated", "event": event}),
        DispatchOutcome::FreeIntervals(intervals) => json!({"status": "free_intervals", "intervals": intervals}),
        DispatchOutcome::Solutions(solutions) => json!({"status": "solutions", "solutions": solutions}),
        DispatchOutcome::Help => json!({"status": "help"}),
        DispatchOutcome::Preferences => json!({"status": "preferences"}),
        DispatchOutcome::Cancelled => json!({"status": "cancelled"}),
        DispatchOutcome::NoRecentEvent => json!({"status": "no_recent_event"}),
        DispatchOutcome::NotFound(raw) => json!({"status": "not_found", "raw": raw}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn days_label_recognizes_canonical_sets() {
        let all: BTreeSet<String> = ALL_DAYS.iter().map(|s| s.to_string()).collect();
        assert_eq!(days_label(&all), "Every day");

        let weekdays: BTreeSet<String> = WEEKDAYS.iter().map(|s| s.to_string()).collect();
        assert_eq!(days_label(&weekdays), "Weekdays");

        let weekends: BTreeSet<String> = WEEKENDS.iter().map(|s| s.to_string()).collect();
        assert_eq!(days_label(&weekends), "Weekends");
    }

    #[test]
    fn days_label_abbreviates_arbitrary_sets() {
        let days: BTreeSet<String> = ["monday".to_string(), "wednesday".to_string()].into_iter().collect();
        assert_eq!(days_label(&days), "Mon, Wed");
    }
}
