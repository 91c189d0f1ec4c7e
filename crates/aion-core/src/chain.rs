//! The Chain Coordinator (C9): a batch of commands parsed from one input
//! line. Detects intra-batch conflicts and pre-solves untimed SCHEDULE
//! commands in declaration order, so command N+1 always sees command N's
//! chosen time, whether user-supplied or solver-supplied.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::error::Result;
use crate::event::{Category, Event};
use crate::intent::{Command, CommandIntent};
use crate::preferences::Preferences;
use crate::slots::{duration_to_slots, slot_of};
use crate::solver::{find_available_slots, ScheduleRequest};

/// Indices of commands that intra-batch-conflict with at least one other
/// timed SCHEDULE command on the same date. A command's absence from the
/// result does not mean it's conflict-free against the stored calendar —
/// only against its siblings in this batch.
pub fn find_chain_conflicts(commands: &[Command]) -> BTreeSet<usize> {
    let timed: Vec<(usize, NaiveDate, usize, usize)> = commands
        .iter()
        .enumerate()
        .filter_map(|(i, cmd)| match &cmd.intent {
            CommandIntent::Schedule {
                dates,
                time: Some(time),
                duration_minutes: Some(duration),
                ..
            } => {
                let date = *dates.first()?;
                let start = slot_of(time).ok()?;
                let len = duration_to_slots(*duration).ok()?;
                Some((i, date, start, start + len))
            }
            _ => None,
        })
        .collect();

    let mut conflicts = BTreeSet::new();
    for a in 0..timed.len() {
        for b in (a + 1)..timed.len() {
            let (ia, date_a, start_a, end_a) = timed[a];
            let (ib, date_b, start_b, end_b) = timed[b];
            if date_a == date_b && start_a < end_b && start_b < end_a {
                conflicts.insert(ia);
                conflicts.insert(ib);
            }
        }
    }
    conflicts
}

fn virtual_event(index: usize, title: &str, date: NaiveDate, time: &str, duration_minutes: i64) -> Event {
    Event {
        id: format!("virtual-{index}"),
        title: title.to_string(),
        date,
        time: time.to_string(),
        duration_minutes,
        description: String::new(),
        category: Category::Other,
    }
}

/// Pre-solve every untimed SCHEDULE command in `commands`, mutating each
/// solved one's `time` field in place and accumulating it as a virtual
/// event so later commands in the batch see it as busy. Returns the
/// indices of commands that couldn't be solved at all; those are left
/// untimed and should be skipped at execution.
pub fn presolve_untimed(
    commands: &mut [Command],
    stored_events: &[Event],
    prefs: &Preferences,
    today: NaiveDate,
) -> Result<Vec<usize>> {
    let mut virtual_events: Vec<Event> = Vec::new();
    let mut failed = Vec::new();

    for (index, command) in commands.iter_mut().enumerate() {
        let CommandIntent::Schedule {
            activity,
            dates,
            time,
            duration_minutes,
            time_bias,
            ..
        } = &mut command.intent
        else {
            continue;
        };
        if time.is_some() {
            continue;
        }
        let duration = duration_minutes.unwrap_or(60);
        let mut request = ScheduleRequest::new(activity.clone(), duration);
        request.date = dates.first().copied();
        request.time_bias = *time_bias;

        let combined: Vec<Event> = stored_events.iter().cloned().chain(virtual_events.iter().cloned()).collect();
        let solutions = find_available_slots(&combined, prefs, &request, 1, today)?;

        match solutions.into_iter().next().and_then(|s| s.into_iter().next()) {
            Some(solution) => {
                *time = Some(solution.time.clone());
                if dates.is_empty() {
                    dates.push(solution.date);
                }
                virtual_events.push(virtual_event(index, activity, solution.date, &solution.time, duration));
            }
            None => failed.push(index),
        }
    }

    Ok(failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::TimeBias;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn schedule(activity: &str, date: Option<NaiveDate>, time: Option<&str>, duration: i64) -> Command {
        Command {
            intent: CommandIntent::Schedule {
                activity: activity.to_string(),
                label: None,
                dates: date.into_iter().collect(),
                date_label: String::new(),
                time: time.map(|t| t.to_string()),
                duration_minutes: Some(duration),
                time_bias: None,
            },
            confidence: 0.9,
            raw: format!("schedule {activity}"),
        }
    }

    #[test]
    fn detects_overlapping_timed_commands() {
        let commands = vec![
            schedule("gym", Some(ymd(2026, 2, 18)), Some("09:00"), 60),
            schedule("call", Some(ymd(2026, 2, 18)), Some("09:30"), 60),
            schedule("lunch", Some(ymd(2026, 2, 18)), Some("12:00"), 60),
        ];
        let conflicts = find_chain_conflicts(&commands);
        assert_eq!(conflicts, BTreeSet::from([0, 1]));
    }

    #[test]
    fn different_dates_never_conflict() {
        let commands = vec![
            schedule("gym", Some(ymd(2026, 2, 18)), Some("09:00"), 60),
            schedule("call", Some(ymd(2026, 2, 19)), Some("09:00"), 60),
        ];
        assert!(find_chain_conflicts(&commands).is_empty());
    }

    // S5: chain pre-solve.
    #[test]
    fn presolve_gives_distinct_times_with_no_conflict() {
        let date = ymd(2026, 2, 18);
        let mut commands = vec![
            schedule("study", Some(date), None, 60),
            schedule("reading", Some(date), None, 60),
        ];
        let prefs = Preferences::default();
        let failed = presolve_untimed(&mut commands, &[], &prefs, date).unwrap();
        assert!(failed.is_empty());

        let times: Vec<String> = commands
            .iter()
            .map(|c| match &c.intent {
                CommandIntent::Schedule { time, .. } => time.clone().unwrap(),
                _ => unreachable!(),
            })
            .collect();
        assert_ne!(times[0], times[1]);
        assert!(find_chain_conflicts(&commands).is_empty());
    }

    #[test]
    fn unsolvable_command_is_reported_as_failed() {
        let date = ymd(2026, 2, 18);
        let mut commands = vec![schedule("marathon", Some(date), None, 2000)];
        let prefs = Preferences::default();
        let failed = presolve_untimed(&mut commands, &[], &prefs, date).unwrap();
        assert_eq!(failed, vec![0]);
    }

    #[test]
    fn time_bias_is_honored_during_presolve() {
        let date = ymd(2026, 2, 18);
        let mut commands = vec![Command {
            intent: CommandIntent::Schedule {
                activity: "gym".to_string(),
                label: None,
                dates: vec![date],
                date_label: String::new(),
                time: None,
                duration_minutes: Some(60),
                time_bias: Some(TimeBias::Morning),
            },
            confidence: 0.9,
            raw: "schedule gym in the morning".to_string(),
        }];
        let prefs = Preferences::default();
        presolve_untimed(&mut commands, &[], &prefs, date).unwrap();
        match &commands[0].intent {
            CommandIntent::Schedule { time, .. } => assert_eq!(time.as_deref(), Some("06:00")),
            _ => unreachable!(),
        }
    }
}
