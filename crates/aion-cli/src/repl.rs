//! The interactive prompt loop: reads a line, feeds it through the Intent
//! Pipeline and Command Dispatcher, and renders the result. Special verbs
//! (`login`, `logout`, `preferences`, `setup`, `quit`) are intercepted
//! before the pipeline ever sees them, per the CLI surface (§6).

use std::io::Write;

use aion_core::chain;
use aion_core::config::AppConfig;
use aion_core::dispatcher::{DispatchOutcome, Dispatcher};
use aion_core::event::EventStore;
use aion_core::intent::ollama::OllamaParser;
use aion_core::intent::pipeline::IntentPipeline;
use aion_core::preferences::Preferences;
use aion_core::session::SessionMemory;
use chrono::NaiveDate;

use crate::display;
use crate::prompter::{self, TerminalPrompter};

fn today(timezone: &str) -> NaiveDate {
    use chrono::Utc;
    timezone
        .parse::<chrono_tz::Tz>()
        .map(|tz| Utc::now().with_timezone(&tz).date_naive())
        .unwrap_or_else(|_| Utc::now().date_naive())
}

fn read_line() -> Option<String> {
    print!("> ");
    std::io::stdout().flush().ok()?;
    let mut line = String::new();
    match std::io::stdin().read_line(&mut line) {
        Ok(0) => None, // EOF
        Ok(_) => Some(line.trim().to_string()),
        Err(_) => None,
    }
}

pub async fn run(store: &dyn EventStore, config: &mut AppConfig, prefs_path: &std::path::Path) -> anyhow::Result<()> {
    let mut prefs = Preferences::load(prefs_path)?;
    let mut session = SessionMemory::new();
    let prompter = TerminalPrompter;

    display::banner();

    loop {
        let Some(input) = read_line() else {
            break;
        };
        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "quit" | "exit" | "q" => break,
            "login" => {
                if let Err(e) = crate::commands::login::execute(config).await {
                    display::error(&e.to_string());
                }
                continue;
            }
            "logout" => {
                if let Err(e) = crate::commands::logout::execute() {
                    display::error(&e.to_string());
                }
                continue;
            }
            "preferences" | "prefs" | "settings" => {
                if let Err(e) = crate::commands::settings::interactive_menu(&mut prefs, prefs_path) {
                    display::error(&e.to_string());
                }
                continue;
            }
            "setup" | "enable ollama" => {
                if let Err(e) = crate::commands::setup::execute(config).await {
                    display::error(&e.to_string());
                }
                continue;
            }
            _ => {}
        }

        if let Err(e) = handle_line(&input, store, config, &mut prefs, prefs_path, &mut session, &prompter).await {
            display::error(&e.to_string());
        }
    }

    Ok(())
}

async fn handle_line(
    input: &str,
    store: &dyn EventStore,
    config: &AppConfig,
    prefs: &mut Preferences,
    prefs_path: &std::path::Path,
    session: &mut SessionMemory,
    prompter: &TerminalPrompter,
) -> anyhow::Result<()> {
    let today = today(&config.timezone);

    let nl_parser = if prefs.nl_parser_enabled && config.nl_parser_enabled {
        Some(OllamaParser::new(config.ollama_url.clone(), config.ollama_model.clone()))
    } else {
        None
    };
    let pipeline = IntentPipeline::new(nl_parser);

    let context_events = {
        let mut recent = store.list(today).await?;
        let mut upcoming = store.list_range(today, today + chrono::Duration::days(7)).await?;
        recent.append(&mut upcoming);
        recent.truncate(20);
        recent
    };

    let mut commands = pipeline.parse(input, today, &context_events).await?;
    if commands.len() > 1 {
        let stored = store.list_range(today, today + chrono::Duration::days(30)).await?;
        chain::presolve_untimed(&mut commands, &stored, prefs, today)?;
    }

    for command in commands {
        match &command.intent {
            aion_core::intent::CommandIntent::Unknown => {
                if let Some(retry_intent) = prompter::guided_fallback() {
                    let reclassified = retry_as(retry_intent, &command.raw, today);
                    let mut dispatcher = Dispatcher::new(store, prefs, session);
                    let outcome = dispatcher.dispatch(reclassified, today, prompter).await?;
                    render(outcome);
                }
            }
            aion_core::intent::CommandIntent::Preferences => {
                crate::commands::settings::interactive_menu(prefs, prefs_path)?;
            }
            _ => {
                let mut dispatcher = Dispatcher::new(store, &*prefs, session);
                let outcome = dispatcher.dispatch(command, today, prompter).await?;
                render(outcome);
            }
        }
    }

    Ok(())
}

fn retry_as(intent_name: &str, raw: &str, today: NaiveDate) -> aion_core::intent::Command {
    use aion_core::intent::CommandIntent;
    let intent = match intent_name {
        "SCHEDULE" => CommandIntent::Schedule {
            activity: raw.to_string(),
            label: None,
            dates: vec![today],
            date_label: String::new(),
            time: None,
            duration_minutes: None,
            time_bias: None,
        },
        "LIST" => CommandIntent::List { dates: vec![today], date_label: String::new() },
        "FIND_FREE" => CommandIntent::FindFree { dates: vec![today], duration_minutes: None },
        _ => CommandIntent::Unknown,
    };
    aion_core::intent::Command { intent, confidence: 0.3, raw: raw.to_string() }
}

fn render(outcome: DispatchOutcome) {
    match outcome {
        DispatchOutcome::Scheduled(event) => {
            display::success(&format!("Scheduled \"{}\" on {} at {}.", event.title, event.date.format("%a %b %d"), event.time));
        }
        DispatchOutcome::Listed(events) => display::events(&events, ""),
        DispatchOutcome::Deleted(event) => display::success(&format!("Deleted \"{}\".", event.title)),
        DispatchOutcome::Updated(event) => {
            display::success(&format!("Updated \"{}\" to {} at {}.", event.title, event.date.format("%a %b %d"), event.time));
        }
        DispatchOutcome::FreeIntervals(intervals) => display::free_intervals(&intervals, ""),
        DispatchOutcome::Solutions(solutions) => match solutions.into_iter().flatten().next() {
            Some(solution) => display::solution(&solution),
            None => display::error("No available slots for this request."),
        },
        DispatchOutcome::Help => display::help(),
        DispatchOutcome::Preferences => {}
        DispatchOutcome::Cancelled => display::info("Cancelled."),
        DispatchOutcome::NoRecentEvent => display::error("I don't have a recent event to act on."),
        DispatchOutcome::NotFound(_) => {}
    }
}
