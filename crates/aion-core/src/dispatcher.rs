//! The Command Dispatcher (C11): combines the Scheduling Core and the
//! Event Store per intent, driving interactive confirmation through the
//! [`Prompter`] port so this crate stays free of any particular terminal
//! library.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{AionError, Result};
use crate::event::{Event, EventChanges, EventStore, NewEvent};
use crate::intent::{Command, CommandIntent};
use crate::preferences::{Preferences, TimeBias};
use crate::session::SessionMemory;
use crate::solver::{self, FreeInterval, ScheduleRequest, SlotSolution, Solution};

/// What the user chose when a proposed time collided with an existing
/// event or a blocked window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    FindNextSlot,
    Override,
    Cancel,
}

/// What the user chose when shown a solver-suggested candidate slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateChoice {
    Accept,
    TryNext,
    ChangeTimeBias(Option<TimeBias>),
    ManualTime(String),
    Cancel,
}

/// Interactive confirmation hooks the dispatcher calls out to. Concrete
/// terminal behavior (dialoguer prompts, colored output) lives in the
/// CLI crate; this crate only needs the decision.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// `time` and `duration_minutes` collided with `conflicts`
    /// (and/or blocked windows, summarized in `blocked_labels`).
    async fn resolve_conflict(&self, conflicts: &[Event], blocked_labels: &[String]) -> ConflictChoice;

    /// Show a candidate slot from the solver; `remaining` is how many
    /// more candidates are available after this one.
    async fn review_candidate(&self, solution: &SlotSolution, remaining: usize) -> CandidateChoice;

    /// More than one stored event fuzzy-matched a title; ask the user
    /// which one they meant. `None` means the user backed out.
    async fn disambiguate(&self, candidates: &[Event]) -> Option<usize>;
}

/// The result of dispatching one command, for the CLI to render.
#[derive(Debug)]
pub enum DispatchOutcome {
    Scheduled(Event),
    Listed(Vec<Event>),
    Deleted(Event),
    Updated(Event),
    FreeIntervals(Vec<FreeInterval>),
    Solutions(Vec<Solution>),
    Help,
    Preferences,
    Cancelled,
    NoRecentEvent,
    NotFound(String),
}

pub struct Dispatcher<'a> {
    store: &'a dyn EventStore,
    prefs: &'a Preferences,
    session: &'a mut SessionMemory,
}

impl<'a> Dispatcher<'a> {
    pub fn new(store: &'a dyn EventStore, prefs: &'a Preferences, session: &'a mut SessionMemory) -> Self {
        Dispatcher { store, prefs, session }
    }

    pub async fn dispatch(&mut self, command: Command, today: NaiveDate, prompter: &dyn Prompter) -> Result<DispatchOutcome> {
        match command.intent.clone() {
            CommandIntent::Schedule { .. } => self.handle_schedule(command, today, prompter).await,
            CommandIntent::List { dates, .. } => self.handle_list(dates).await,
            CommandIntent::Delete { activity, dates, .. } => {
                self.handle_delete(activity, dates, &command.raw, today, prompter).await
            }
            CommandIntent::Update {
                activity,
                dates,
                time,
                duration_minutes,
                ..
            } => {
                self.handle_update(activity, dates, time, duration_minutes, &command.raw, today, prompter)
                    .await
            }
            CommandIntent::FindFree { dates, duration_minutes } => {
                self.handle_find_free(dates, duration_minutes, today).await
            }
            CommandIntent::FindOptimal {
                activity,
                dates,
                duration_minutes,
                time_bias,
            } => {
                self.handle_find_optimal(activity, dates, duration_minutes, time_bias, today)
                    .await
            }
            CommandIntent::Help => Ok(DispatchOutcome::Help),
            CommandIntent::Preferences => Ok(DispatchOutcome::Preferences),
            CommandIntent::Unknown => Ok(DispatchOutcome::NotFound(command.raw)),
        }
    }

    async fn handle_schedule(&mut self, command: Command, today: NaiveDate, prompter: &dyn Prompter) -> Result<DispatchOutcome> {
        let CommandIntent::Schedule {
            activity,
            label,
            dates,
            time,
            duration_minutes,
            time_bias,
            ..
        } = command.intent
        else {
            unreachable!("handle_schedule called with a non-Schedule command")
        };

        let title = label.unwrap_or(activity.clone());
        let date = dates.first().copied().unwrap_or(today);
        let duration = duration_minutes.unwrap_or(60);

        match time {
            Some(explicit_time) => self.schedule_at_explicit_time(title, date, explicit_time, duration, prompter).await,
            None => self.schedule_via_solver(title, activity, date, duration, time_bias, prompter).await,
        }
    }

    async fn schedule_at_explicit_time(
        &mut self,
        title: String,
        date: NaiveDate,
        mut time: String,
        duration: i64,
        prompter: &dyn Prompter,
    ) -> Result<DispatchOutcome> {
        loop {
            let events = self.store.list(date).await?;
            let conflicts = solver::check_conflict(&events, date, &time, duration)?;
            let blocked = solver::check_preference_block(self.prefs, date, &time, duration, date)?;
            if conflicts.is_empty() && blocked.is_empty() {
                return self.create_and_record(title, date, time, duration).await;
            }

            let blocked_labels: Vec<String> = blocked.iter().map(|w| w.label.clone()).collect();
            let owned_conflicts: Vec<Event> = conflicts.into_iter().cloned().collect();
            match prompter.resolve_conflict(&owned_conflicts, &blocked_labels).await {
                ConflictChoice::Override => return self.create_and_record(title, date, time, duration).await,
                ConflictChoice::Cancel => return Ok(DispatchOutcome::Cancelled),
                ConflictChoice::FindNextSlot => {
                    let events = self.store.list(date).await?;
                    let mut request = ScheduleRequest::new(title.clone(), duration);
                    request.date = Some(date);
                    match solver::find_available_slots(&events, self.prefs, &request, 1, date)?
                        .into_iter()
                        .next()
                        .and_then(|s| s.into_iter().next())
                    {
                        Some(solution) => time = solution.time,
                        None => return Err(AionError::Unsatisfiable),
                    }
                }
            }
        }
    }

    async fn schedule_via_solver(
        &mut self,
        title: String,
        activity: String,
        date: NaiveDate,
        duration: i64,
        mut time_bias: Option<TimeBias>,
        prompter: &dyn Prompter,
    ) -> Result<DispatchOutcome> {
        let mut offset = 0usize;
        loop {
            let events = self.store.list(date).await?;
            let mut request = ScheduleRequest::new(activity.clone(), duration);
            request.date = Some(date);
            request.time_bias = time_bias;

            let solutions = solver::find_available_slots(&events, self.prefs, &request, offset + 1, date)?;
            let Some(solution) = solutions.get(offset).and_then(|s| s.first()) else {
                return Err(AionError::Unsatisfiable);
            };

            let remaining = solutions.len().saturating_sub(offset + 1);
            match prompter.review_candidate(solution, remaining).await {
                CandidateChoice::Accept => {
                    let (chosen_date, chosen_time) = (solution.date, solution.time.clone());
                    return self.create_and_record(title, chosen_date, chosen_time, duration).await;
                }
                CandidateChoice::TryNext => offset += 1,
                CandidateChoice::ChangeTimeBias(bias) => {
                    time_bias = bias;
                    offset = 0;
                }
                CandidateChoice::ManualTime(manual) => {
                    return self.schedule_at_explicit_time(title, date, manual, duration, prompter).await;
                }
                CandidateChoice::Cancel => return Ok(DispatchOutcome::Cancelled),
            }
        }
    }

    async fn create_and_record(&mut self, title: String, date: NaiveDate, time: String, duration: i64) -> Result<DispatchOutcome> {
        let event = self
            .store
            .create(NewEvent {
                title,
                date,
                time,
                duration_minutes: duration,
                description: String::new(),
            })
            .await?;
        self.session.record_created(event.clone());
        Ok(DispatchOutcome::Scheduled(event))
    }

    async fn handle_list(&self, dates: Vec<NaiveDate>) -> Result<DispatchOutcome> {
        let events = match (dates.first(), dates.last()) {
            (Some(only), Some(last)) if only == last => self.store.list(*only).await?,
            (Some(first), Some(last)) => self.store.list_range(*first, *last).await?,
            _ => Vec::new(),
        };
        Ok(DispatchOutcome::Listed(events))
    }

    async fn candidates_for_match(&self, dates: &[NaiveDate], today: NaiveDate) -> Result<Vec<Event>> {
        if let Some(&date) = dates.first() {
            return self.store.list(date).await;
        }
        let mut todays = self.store.list(today).await?;
        let mut upcoming = self.store.list_range(today, today + chrono::Duration::days(30)).await?;
        todays.append(&mut upcoming);
        Ok(todays)
    }

    async fn resolve_target(
        &self,
        activity: Option<String>,
        dates: Vec<NaiveDate>,
        raw: &str,
        today: NaiveDate,
        prompter: &dyn Prompter,
    ) -> Result<Option<Event>> {
        if SessionMemory::is_anaphoric(activity.as_deref(), raw) {
            let Some((title, date)) = self.session.resolve(dates.first().copied()) else {
                return Ok(None);
            };
            let pool = self.candidates_for_match(&dates, date.unwrap_or(today)).await?;
            return Ok(fuzzy_best_match(&pool, &title));
        }

        let Some(ref activity) = activity else {
            return Ok(None);
        };

        // A bare numeric reference ("delete 1") indexes into today's events.
        if let Ok(index) = activity.trim().parse::<usize>() {
            let todays = self.store.list(today).await?;
            return Ok(index.checked_sub(1).and_then(|i| todays.get(i).cloned()));
        }

        let pool = self.candidates_for_match(&dates, today).await?;
        let scored = fuzzy_matches(&pool, activity);
        match scored.len() {
            0 => Ok(None),
            1 => Ok(Some(scored[0].clone())),
            _ => match prompter.disambiguate(&scored).await {
                Some(index) => Ok(scored.get(index).cloned()),
                None => Ok(None),
            },
        }
    }

    async fn handle_delete(
        &mut self,
        activity: Option<String>,
        dates: Vec<NaiveDate>,
        raw: &str,
        today: NaiveDate,
        prompter: &dyn Prompter,
    ) -> Result<DispatchOutcome> {
        match self.resolve_target(activity, dates, raw, today, prompter).await? {
            None => Ok(DispatchOutcome::NoRecentEvent),
            Some(event) => {
                self.store.delete(&event.id).await?;
                Ok(DispatchOutcome::Deleted(event))
            }
        }
    }

    async fn handle_update(
        &mut self,
        activity: Option<String>,
        dates: Vec<NaiveDate>,
        time: Option<String>,
        duration_minutes: Option<i64>,
        raw: &str,
        today: NaiveDate,
        prompter: &dyn Prompter,
    ) -> Result<DispatchOutcome> {
        match self.resolve_target(activity, dates.clone(), raw, today, prompter).await? {
            None => Ok(DispatchOutcome::NoRecentEvent),
            Some(event) => {
                let changes = EventChanges {
                    date: dates.first().copied(),
                    time,
                    duration_minutes,
                    ..Default::default()
                };
                let updated = self.store.update(&event.id, changes).await?;
                self.session.record(&updated);
                Ok(DispatchOutcome::Updated(updated))
            }
        }
    }

    async fn handle_find_free(&self, dates: Vec<NaiveDate>, duration_minutes: Option<i64>, today: NaiveDate) -> Result<DispatchOutcome> {
        let date = dates.first().copied().unwrap_or(today);
        let events = self.store.list(date).await?;
        let intervals = solver::find_free_intervals(&events, self.prefs, date, duration_minutes.unwrap_or(30), today)?;
        Ok(DispatchOutcome::FreeIntervals(intervals))
    }

    async fn handle_find_optimal(
        &self,
        activity: String,
        dates: Vec<NaiveDate>,
        duration_minutes: Option<i64>,
        time_bias: Option<TimeBias>,
        today: NaiveDate,
    ) -> Result<DispatchOutcome> {
        let date = dates.first().copied();
        let events = match date {
            Some(d) => self.store.list(d).await?,
            None => self.store.list_range(today, today + chrono::Duration::days(6)).await?,
        };
        let mut request = ScheduleRequest::new(activity, duration_minutes.unwrap_or(60));
        request.date = date;
        request.time_bias = time_bias;
        let solutions = solver::find_available_slots(&events, self.prefs, &request, 3, today)?;
        Ok(DispatchOutcome::Solutions(solutions))
    }
}

/// Fuzzy title match: case-insensitive substring containment either
/// direction, ranked by how much of the shorter string matched.
fn fuzzy_score(query: &str, title: &str) -> Option<usize> {
    let q = query.trim().to_lowercase();
    let t = title.to_lowercase();
    if q.is_empty() {
        return None;
    }
    if t == q {
        return Some(1000);
    }
    if t.contains(&q) {
        return Some(500 + q.len());
    }
    if q.contains(&t) {
        return Some(400 + t.len());
    }
    let q_words: std::collections::HashSet<&str> = q.split_whitespace().collect();
    let overlap = t.split_whitespace().filter(|w| q_words.contains(w)).count();
    if overlap > 0 {
        Some(overlap)
    } else {
        None
    }
}

fn fuzzy_matches(pool: &[Event], query: &str) -> Vec<Event> {
    let mut scored: Vec<(usize, &Event)> = pool.iter().filter_map(|e| fuzzy_score(query, &e.title).map(|s| (s, e))).collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, e)| e.clone()).collect()
}

fn fuzzy_best_match(pool: &[Event], query: &str) -> Option<Event> {
    fuzzy_matches(pool, query).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryEventStore;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct AutoAccept;

    #[async_trait]
    impl Prompter for AutoAccept {
        async fn resolve_conflict(&self, _conflicts: &[Event], _blocked_labels: &[String]) -> ConflictChoice {
            ConflictChoice::FindNextSlot
        }
        async fn review_candidate(&self, _solution: &SlotSolution, _remaining: usize) -> CandidateChoice {
            CandidateChoice::Accept
        }
        async fn disambiguate(&self, _candidates: &[Event]) -> Option<usize> {
            Some(0)
        }
    }

    fn schedule_command(activity: &str, date: NaiveDate, time: Option<&str>) -> Command {
        Command {
            intent: CommandIntent::Schedule {
                activity: activity.to_string(),
                label: None,
                dates: vec![date],
                date_label: String::new(),
                time: time.map(str::to_string),
                duration_minutes: Some(60),
                time_bias: None,
            },
            confidence: 0.9,
            raw: format!("schedule {activity}"),
        }
    }

    #[tokio::test]
    async fn schedule_without_time_uses_solver_and_records_session() {
        let store = MemoryEventStore::new();
        let prefs = Preferences::default();
        let mut session = SessionMemory::new();
        let today = ymd(2026, 2, 18);
        let mut dispatcher = Dispatcher::new(&store, &prefs, &mut session);

        let outcome = dispatcher
            .dispatch(schedule_command("gym", today, None), today, &AutoAccept)
            .await
            .unwrap();
        match outcome {
            DispatchOutcome::Scheduled(event) => assert_eq!(event.time, "06:00"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(session.last_title.as_deref(), Some("gym"));
    }

    #[tokio::test]
    async fn explicit_time_conflict_finds_next_slot() {
        let store = MemoryEventStore::new();
        let today = ymd(2026, 2, 18);
        store
            .create(NewEvent {
                title: "standup".into(),
                date: today,
                time: "09:00".into(),
                duration_minutes: 60,
                description: String::new(),
            })
            .await
            .unwrap();
        let prefs = Preferences::default();
        let mut session = SessionMemory::new();
        let mut dispatcher = Dispatcher::new(&store, &prefs, &mut session);

        let outcome = dispatcher
            .dispatch(schedule_command("gym", today, Some("09:00")), today, &AutoAccept)
            .await
            .unwrap();
        match outcome {
            DispatchOutcome::Scheduled(event) => assert_ne!(event.time, "09:00"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_with_no_session_memory_reports_no_recent_event() {
        let store = MemoryEventStore::new();
        let prefs = Preferences::default();
        let mut session = SessionMemory::new();
        let today = ymd(2026, 2, 18);
        let mut dispatcher = Dispatcher::new(&store, &prefs, &mut session);

        let command = Command {
            intent: CommandIntent::Delete {
                activity: Some("that".to_string()),
                label: None,
                dates: Vec::new(),
            },
            confidence: 0.9,
            raw: "delete that".to_string(),
        };
        let outcome = dispatcher.dispatch(command, today, &AutoAccept).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::NoRecentEvent));
    }

    // S4: anaphora resolution across a create then a delete.
    #[tokio::test]
    async fn anaphora_resolves_to_just_created_event() {
        let store = MemoryEventStore::new();
        let prefs = Preferences::default();
        let mut session = SessionMemory::new();
        let today = ymd(2026, 2, 18);
        {
            let mut dispatcher = Dispatcher::new(&store, &prefs, &mut session);
            dispatcher
                .dispatch(schedule_command("gym", today, Some("06:00")), today, &AutoAccept)
                .await
                .unwrap();
        }
        let mut dispatcher = Dispatcher::new(&store, &prefs, &mut session);
        let command = Command {
            intent: CommandIntent::Delete {
                activity: Some("that".to_string()),
                label: None,
                dates: Vec::new(),
            },
            confidence: 0.9,
            raw: "delete that".to_string(),
        };
        let outcome = dispatcher.dispatch(command, today, &AutoAccept).await.unwrap();
        match outcome {
            DispatchOutcome::Deleted(event) => assert_eq!(event.title, "gym"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn fuzzy_score_prefers_exact_then_containment() {
        assert!(fuzzy_score("gym", "gym").unwrap() > fuzzy_score("gym", "morning gym session").unwrap());
        assert!(fuzzy_score("gym", "morning gym session").is_some());
        assert!(fuzzy_score("xyz", "gym").is_none());
    }

}
