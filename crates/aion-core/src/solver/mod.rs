//! The Scheduling Core (C8): given events, preferences and a request,
//! finds conflict-free slots honoring time-of-day bias, or the set of
//! free intervals on a date.
//!
//! The source expresses this as an answer-set program handed to an
//! external solver. At this scale (<=32 slots x 7 days x a handful of
//! requested sessions) a direct priority search is simpler and removes an
//! external runtime dependency: build a busy bitset per date, enumerate
//! feasible starts, then rank by the lexicographic time-bias objective.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AionError, Result};
use crate::event::Event;
use crate::preferences::{Preferences, TimeBias};
use crate::slots::{
    duration_to_slots, slot_of, time_of, weekday_of, week_dates, within_working_hours,
    AFTERNOON_END, MORNING_END, SLOTS_PER_DAY,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub activity: String,
    pub title: Option<String>,
    pub duration_minutes: i64,
    pub count: usize,
    pub date: Option<NaiveDate>,
    pub allowed_days: BTreeSet<String>,
    pub time_bias: Option<TimeBias>,
    pub avoid_weekends: bool,
    pub working_hours_only: bool,
}

impl ScheduleRequest {
    pub fn new(activity: impl Into<String>, duration_minutes: i64) -> Self {
        ScheduleRequest {
            activity: activity.into(),
            title: None,
            duration_minutes,
            count: 1,
            date: None,
            allowed_days: BTreeSet::new(),
            time_bias: None,
            avoid_weekends: false,
            working_hours_only: false,
        }
    }

    pub fn display_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| self.activity.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSolution {
    pub activity: String,
    pub weekday: String,
    pub date: NaiveDate,
    pub time: String,
    pub slot_index: usize,
    pub duration_minutes: i64,
}

pub type Solution = Vec<SlotSolution>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeInterval {
    pub date: NaiveDate,
    pub start: String,
    pub end: String,
    pub duration_minutes: i64,
}

/// A single feasible (date, start-slot) candidate, scored against the
/// request's time-bias objective.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    date: NaiveDate,
    start: usize,
    band_penalty: usize,
    sum_t: usize,
}

impl Candidate {
    fn cost(&self) -> (usize, usize) {
        (self.band_penalty, self.sum_t)
    }
}

/// Busy bitset for a single date: one bool per slot, true if occupied by
/// an event or an active preference window.
fn busy_bitset(events: &[Event], prefs: &Preferences, date: NaiveDate, today: NaiveDate) -> Result<[bool; SLOTS_PER_DAY]> {
    let mut busy = [false; SLOTS_PER_DAY];
    for event in events.iter().filter(|e| e.date == date) {
        let (start, end) = event.slot_range()?;
        for slot in start..end.min(SLOTS_PER_DAY) {
            busy[slot] = true;
        }
    }
    let weekday = weekday_of(date);
    for window in prefs.active_windows(today) {
        if !window.applies_on(&weekday, today, date) {
            continue;
        }
        let start = slot_of(&window.start)?;
        let end = slot_of(&window.end)?;
        for slot in start..end.min(SLOTS_PER_DAY) {
            busy[slot] = true;
        }
    }
    Ok(busy)
}

/// Penalty contribution of a single occupied slot range under a time bias:
/// 1 if any slot in `[start, start+len)` falls outside the preferred band,
/// else 0. Matches the per-slot-summed objective (see design notes).
fn band_penalty(bias: Option<TimeBias>, start: usize, len: usize) -> usize {
    let in_band = match bias {
        Some(TimeBias::Morning) => start + len <= MORNING_END,
        Some(TimeBias::Afternoon) => start >= MORNING_END && start + len <= AFTERNOON_END,
        Some(TimeBias::Evening) => start >= AFTERNOON_END,
        None => return 0,
    };
    if in_band {
        0
    } else {
        1
    }
}

fn in_scope_dates(request: &ScheduleRequest, today: NaiveDate) -> Vec<NaiveDate> {
    match request.date {
        Some(d) => vec![d],
        None => week_dates(today),
    }
}

fn allowed_days_for(request: &ScheduleRequest) -> BTreeSet<String> {
    if let Some(date) = request.date {
        BTreeSet::from([weekday_of(date)])
    } else if request.allowed_days.is_empty() {
        [
            "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    } else {
        request.allowed_days.clone()
    }
}

fn is_weekend(weekday: &str) -> bool {
    weekday == "saturday" || weekday == "sunday"
}

/// All feasible (date, start) candidates for `request`, each already scored.
fn feasible_candidates(
    events: &[Event],
    prefs: &Preferences,
    request: &ScheduleRequest,
    today: NaiveDate,
) -> Result<Vec<Candidate>> {
    let duration_slots = duration_to_slots(request.duration_minutes)?;
    let allowed = allowed_days_for(request);
    let dates = in_scope_dates(request, today);

    let mut candidates = Vec::new();
    for date in dates {
        let weekday = weekday_of(date);
        if !allowed.contains(&weekday) {
            continue;
        }
        if request.avoid_weekends && is_weekend(&weekday) {
            continue;
        }
        let busy = busy_bitset(events, prefs, date, today)?;
        if duration_slots > SLOTS_PER_DAY {
            continue;
        }
        for start in 0..=(SLOTS_PER_DAY - duration_slots) {
            let end = start + duration_slots;
            if busy[start..end].iter().any(|&b| b) {
                continue;
            }
            if request.working_hours_only && !within_working_hours(start, duration_slots) {
                continue;
            }
            candidates.push(Candidate {
                date,
                start,
                band_penalty: band_penalty(request.time_bias, start, duration_slots),
                sum_t: start,
            });
        }
    }
    // Earliest-first stable tie-break: date ascending, then slot ascending.
    candidates.sort_by(|a, b| (a.date, a.start).cmp(&(b.date, b.start)));
    Ok(candidates)
}

fn candidate_into_solution(request: &ScheduleRequest, candidate: Candidate) -> SlotSolution {
    SlotSolution {
        activity: request.display_title(),
        weekday: weekday_of(candidate.date),
        date: candidate.date,
        time: time_of(candidate.start),
        slot_index: candidate.start,
        duration_minutes: request.duration_minutes,
    }
}

/// Find up to `k` ranked [`Solution`]s for `request`. Fails soft: an
/// unsatisfiable request yields an empty vector, never an error — callers
/// that want to distinguish "no slots" from "bad request" should check
/// `request` validity themselves before calling.
pub fn find_available_slots(
    events: &[Event],
    prefs: &Preferences,
    request: &ScheduleRequest,
    k: usize,
    today: NaiveDate,
) -> Result<Vec<Solution>> {
    if request.count == 0 {
        return Err(AionError::Grounding("count must be at least 1".to_string()));
    }
    let mut candidates = feasible_candidates(events, prefs, request, today)?;
    candidates.sort_by(|a, b| a.cost().cmp(&b.cost()).then((a.date, a.start).cmp(&(b.date, b.start))));

    if request.count == 1 {
        return Ok(candidates
            .into_iter()
            .take(k)
            .map(|c| vec![candidate_into_solution(request, c)])
            .collect());
    }

    // count > 1: every chosen date must be distinct. Each date's
    // contribution to the objective is independent of which other dates
    // are chosen, so the best assignment is simply the `count` cheapest
    // per-date-best candidates. Alternative (kth-best) solutions are a
    // sliding window over that per-date ranking — not an exhaustive
    // k-best search, but sufficient at this scale and sound for the
    // always-checked first-ranked solution.
    let mut best_per_date: Vec<Candidate> = Vec::new();
    let mut seen_dates = BTreeSet::new();
    for candidate in candidates {
        if seen_dates.insert(candidate.date) {
            best_per_date.push(candidate);
        }
    }
    best_per_date.sort_by(|a, b| a.cost().cmp(&b.cost()).then((a.date, a.start).cmp(&(b.date, b.start))));

    if best_per_date.len() < request.count {
        return Ok(Vec::new());
    }

    let max_windows = (best_per_date.len() - request.count + 1).min(k.max(1));
    let mut solutions = Vec::new();
    for offset in 0..max_windows {
        let window = &best_per_date[offset..offset + request.count];
        let mut solution: Solution = window
            .iter()
            .map(|c| candidate_into_solution(request, *c))
            .collect();
        solution.sort_by(|a, b| (a.date, a.slot_index).cmp(&(b.date, b.slot_index)));
        solutions.push(solution);
        if solutions.len() >= k {
            break;
        }
    }
    Ok(solutions)
}

/// Maximal free runs on `date`, each at least `min_duration` minutes.
pub fn find_free_intervals(
    events: &[Event],
    prefs: &Preferences,
    date: NaiveDate,
    min_duration_minutes: i64,
    today: NaiveDate,
) -> Result<Vec<FreeInterval>> {
    let busy = busy_bitset(events, prefs, date, today)?;
    let mut intervals = Vec::new();
    let mut run_start: Option<usize> = None;

    for slot in 0..SLOTS_PER_DAY {
        if !busy[slot] {
            run_start.get_or_insert(slot);
        } else if let Some(start) = run_start.take() {
            push_if_long_enough(&mut intervals, date, start, slot, min_duration_minutes);
        }
    }
    if let Some(start) = run_start {
        push_if_long_enough(&mut intervals, date, start, SLOTS_PER_DAY, min_duration_minutes);
    }
    Ok(intervals)
}

fn push_if_long_enough(
    intervals: &mut Vec<FreeInterval>,
    date: NaiveDate,
    start: usize,
    end_exclusive: usize,
    min_duration_minutes: i64,
) {
    let duration_minutes = ((end_exclusive - start) * 30) as i64;
    if duration_minutes >= min_duration_minutes {
        intervals.push(FreeInterval {
            date,
            start: time_of(start),
            end: time_of(end_exclusive),
            duration_minutes,
        });
    }
}

/// Events on `date` that overlap `[time, time+duration)`.
pub fn check_conflict<'a>(
    events: &'a [Event],
    date: NaiveDate,
    time: &str,
    duration_minutes: i64,
) -> Result<Vec<&'a Event>> {
    let start = slot_of(time)?;
    let len = duration_to_slots(duration_minutes)?;
    let end = start + len;
    let mut conflicts = Vec::new();
    for event in events.iter().filter(|e| e.date == date) {
        let (e_start, e_end) = event.slot_range()?;
        if start < e_end && e_start < end {
            conflicts.push(event);
        }
    }
    Ok(conflicts)
}

/// Preference windows on `date`'s weekday that overlap the proposed
/// interval, already filtered by expiry.
pub fn check_preference_block<'a>(
    prefs: &'a Preferences,
    date: NaiveDate,
    time: &str,
    duration_minutes: i64,
    today: NaiveDate,
) -> Result<Vec<&'a crate::preferences::BlockedWindow>> {
    let start = slot_of(time)?;
    let len = duration_to_slots(duration_minutes)?;
    let end = start + len;
    let weekday = weekday_of(date);
    let mut blocked = Vec::new();
    for window in prefs.active_windows(today) {
        if !window.applies_on(&weekday, today, date) {
            continue;
        }
        let w_start = slot_of(&window.start)?;
        let w_end = slot_of(&window.end)?;
        if start < w_end && w_start < end {
            blocked.push(window);
        }
    }
    Ok(blocked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Category;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event(date: NaiveDate, time: &str, duration: i64) -> Event {
        Event {
            id: "e1".into(),
            title: "Meeting".into(),
            date,
            time: time.into(),
            duration_minutes: duration,
            description: String::new(),
            category: Category::Other,
        }
    }

    // S1: conflict avoidance.
    #[test]
    fn s1_avoids_existing_event() {
        let date = ymd(2026, 2, 18);
        let events = vec![event(date, "09:00", 60)];
        let prefs = Preferences::default();
        let mut request = ScheduleRequest::new("gym", 60);
        request.date = Some(date);
        let solutions = find_available_slots(&events, &prefs, &request, 5, date).unwrap();
        let first = &solutions[0][0];
        assert_ne!(first.time, "09:00");
        assert_ne!(first.time, "09:30");
        assert_eq!(first.time, "06:00");
    }

    // S2: morning bias.
    #[test]
    fn s2_morning_bias_picks_earliest_morning_slot() {
        let date = ymd(2026, 2, 18);
        let prefs = Preferences::default();
        let mut request = ScheduleRequest::new("gym", 60);
        request.date = Some(date);
        request.time_bias = Some(TimeBias::Morning);
        let solutions = find_available_slots(&[], &prefs, &request, 1, date).unwrap();
        assert_eq!(solutions[0][0].time, "06:00");
    }

    // S3: free intervals with one event.
    #[test]
    fn s3_free_intervals_around_one_event() {
        let date = ymd(2026, 2, 18);
        let events = vec![event(date, "10:00", 60)];
        let prefs = Preferences::default();
        let intervals = find_free_intervals(&events, &prefs, date, 30, date).unwrap();
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].start, "06:00");
        assert_eq!(intervals[0].end, "10:00");
        assert_eq!(intervals[0].duration_minutes, 240);
        assert_eq!(intervals[1].start, "11:00");
        assert_eq!(intervals[1].end, "22:00");
        assert_eq!(intervals[1].duration_minutes, 660);
    }

    #[test]
    fn free_interval_trailing_run_is_closed_at_day_end() {
        let date = ymd(2026, 2, 18);
        let prefs = Preferences::default();
        // No events at all: one run spanning the whole day.
        let intervals = find_free_intervals(&[], &prefs, date, 30, date).unwrap();
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].end, "22:00");
        assert_eq!(intervals[0].duration_minutes, (SLOTS_PER_DAY as i64) * 30);
    }

    #[test]
    fn conflict_detection_uses_half_open_overlap() {
        let date = ymd(2026, 2, 18);
        let events = vec![event(date, "09:00", 60)];
        // 08:30-09:30 overlaps the 09:00-10:00 event.
        let conflicts = check_conflict(&events, date, "08:30", 60).unwrap();
        assert_eq!(conflicts.len(), 1);
        // 08:00-09:00 does not overlap (touches but doesn't cross).
        let no_conflicts = check_conflict(&events, date, "08:00", 60).unwrap();
        assert!(no_conflicts.is_empty());
    }

    #[test]
    fn count_greater_than_one_uses_distinct_dates() {
        let today = ymd(2026, 2, 16); // a Monday
        let prefs = Preferences::default();
        let mut request = ScheduleRequest::new("study", 60);
        request.count = 2;
        let solutions = find_available_slots(&[], &prefs, &request, 1, today).unwrap();
        let solution = &solutions[0];
        assert_eq!(solution.len(), 2);
        assert_ne!(solution[0].date, solution[1].date);
    }

    #[test]
    fn unsatisfiable_request_returns_empty_not_error() {
        let date = ymd(2026, 2, 18);
        let prefs = Preferences::default();
        // A duration longer than the whole day can never fit.
        let mut request = ScheduleRequest::new("marathon", 2000);
        request.date = Some(date);
        let solutions = find_available_slots(&[], &prefs, &request, 5, date).unwrap();
        assert!(solutions.is_empty());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::event::Category;
    use proptest::prelude::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    proptest! {
        #[test]
        fn solver_never_returns_overlapping_solution(
            event_start in 0usize..30,
            event_duration_slots in 1usize..4,
            request_duration_slots in 1usize..4,
        ) {
            let date = ymd(2026, 2, 18);
            let prefs = Preferences::default();
            let events = vec![Event {
                id: "e".into(),
                title: "x".into(),
                date,
                time: time_of(event_start),
                duration_minutes: (event_duration_slots * 30) as i64,
                description: String::new(),
                category: Category::Other,
            }];
            let mut request = ScheduleRequest::new("y", (request_duration_slots * 30) as i64);
            request.date = Some(date);
            let solutions = find_available_slots(&events, &prefs, &request, 3, date).unwrap();
            for solution in &solutions {
                for slot_solution in solution {
                    let conflicts = check_conflict(&events, date, &slot_solution.time, slot_solution.duration_minutes).unwrap();
                    prop_assert!(conflicts.is_empty());
                }
            }
        }

        #[test]
        fn free_intervals_are_disjoint_and_increasing(
            busy_start in 0usize..30,
            busy_len in 1usize..4,
        ) {
            let date = ymd(2026, 2, 18);
            let prefs = Preferences::default();
            let events = vec![Event {
                id: "e".into(),
                title: "x".into(),
                date,
                time: time_of(busy_start),
                duration_minutes: (busy_len * 30) as i64,
                description: String::new(),
                category: Category::Other,
            }];
            let intervals = find_free_intervals(&events, &prefs, date, 1, date).unwrap();
            for w in intervals.windows(2) {
                prop_assert!(w[0].end <= w[1].start);
            }
        }
    }
}
