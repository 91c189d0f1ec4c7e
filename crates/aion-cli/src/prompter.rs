//! A [`dialoguer`]-backed implementation of the core's [`Prompter`] port,
//! plus the guided fallback menu for `UNKNOWN` intents (C15).

use aion_core::dispatcher::{CandidateChoice, ConflictChoice, Prompter};
use aion_core::event::Event;
use aion_core::preferences::TimeBias;
use aion_core::solver::SlotSolution;
use async_trait::async_trait;
use dialoguer::{Input, Select};

use crate::display;

pub struct TerminalPrompter;

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn resolve_conflict(&self, conflicts: &[Event], blocked_labels: &[String]) -> ConflictChoice {
        if !conflicts.is_empty() {
            eprintln!("  That time conflicts with:");
            for event in conflicts {
                eprintln!("    - {} {} ({} min)", event.time, event.title, event.duration_minutes);
            }
        }
        if !blocked_labels.is_empty() {
            eprintln!("  That time falls in a blocked window: {}", blocked_labels.join(", "));
        }

        let options = ["Find the next available slot", "Schedule anyway", "Cancel"];
        let choice = Select::new().with_prompt("  What would you like to do?").items(&options).default(0).interact().unwrap_or(2);
        match choice {
            0 => ConflictChoice::FindNextSlot,
            1 => ConflictChoice::Override,
            _ => ConflictChoice::Cancel,
        }
    }

    async fn review_candidate(&self, solution: &SlotSolution, remaining: usize) -> CandidateChoice {
        display::solution(solution);

        let mut options = vec!["Accept this slot".to_string()];
        if remaining > 0 {
            options.push(format!("Try the next slot ({remaining} more available)"));
        }
        options.push("Change time preference".to_string());
        options.push("Enter a specific time".to_string());
        options.push("Cancel".to_string());

        let choice = Select::new().with_prompt("  What would you like to do?").items(&options).default(0).interact().unwrap_or(options.len() - 1);

        let has_try_next = remaining > 0;
        match (choice, has_try_next) {
            (0, _) => CandidateChoice::Accept,
            (1, true) => CandidateChoice::TryNext,
            (i, true) if i == 2 => self.prompt_time_bias(),
            (i, true) if i == 3 => self.prompt_manual_time(),
            (1, false) => self.prompt_time_bias(),
            (2, false) => self.prompt_manual_time(),
            _ => CandidateChoice::Cancel,
        }
    }

    async fn disambiguate(&self, candidates: &[Event]) -> Option<usize> {
        eprintln!("  Multiple events match:");
        let options: Vec<String> = candidates.iter().map(|e| format!("{} {} — {}", e.date, e.time, e.title)).collect();
        Select::new().with_prompt("  Which one did you mean?").items(&options).default(0).interact_opt().ok().flatten()
    }
}

impl TerminalPrompter {
    fn prompt_time_bias(&self) -> CandidateChoice {
        let options = ["Morning", "Afternoon", "Evening", "No preference"];
        let choice = Select::new().with_prompt("  Preferred time of day").items(&options).default(3).interact().unwrap_or(3);
        let bias = match choice {
            0 => Some(TimeBias::Morning),
            1 => Some(TimeBias::Afternoon),
            2 => Some(TimeBias::Evening),
            _ => None,
        };
        CandidateChoice::ChangeTimeBias(bias)
    }

    fn prompt_manual_time(&self) -> CandidateChoice {
        let time: String = Input::new().with_prompt("  Enter a time (HH:MM)").interact_text().unwrap_or_default();
        CandidateChoice::ManualTime(time)
    }
}

/// Shown for `UNKNOWN` intents: lets the user pick a likely intent to
/// retry the raw input against. Returns `None` for "something else".
pub fn guided_fallback() -> Option<&'static str> {
    eprintln!("\n  I didn't fully understand that. Did you mean to:");
    let options = [
        "Schedule an event",
        "List events",
        "Find free slots",
        "Something else (try simpler phrasing)",
    ];
    let choice = Select::new().with_prompt("  Choose").items(&options).default(3).interact().unwrap_or(3);
    match choice {
        0 => Some("SCHEDULE"),
        1 => Some("LIST"),
        2 => Some("FIND_FREE"),
        _ => None,
    }
}
