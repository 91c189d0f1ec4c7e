//! The discrete half-hour slot model: wall-clock time as a small integer
//! index, so the solver can reason about a day as a bitset instead of
//! doing duration arithmetic on every candidate.

use chrono::{Datelike, NaiveDate, Weekday};

use crate::error::{AionError, Result};

pub const DAY_START_HOUR: u32 = 6;
pub const DAY_END_HOUR: u32 = 22;

/// Number of half-hour slots between [`DAY_START_HOUR`] and [`DAY_END_HOUR`].
pub const SLOTS_PER_DAY: usize = ((DAY_END_HOUR - DAY_START_HOUR) * 2) as usize;

/// Slots 06:00..09:00 and 18:00..22:00 fall outside "working hours"; the
/// working range itself is slots `[6, 24)`, i.e. 09:00..18:00, but note
/// `24 > SLOTS_PER_DAY` is impossible since `SLOTS_PER_DAY == 32`.
pub const WORKING_HOURS_START: usize = 6;
pub const WORKING_HOURS_END: usize = 24;

pub const MORNING_END: usize = 12;
pub const AFTERNOON_END: usize = 24;

/// Parse `"HH:MM"` into a slot index in `[0, SLOTS_PER_DAY)`.
pub fn slot_of(hhmm: &str) -> Result<usize> {
    let (h, m) = parse_hhmm(hhmm)?;
    if h < DAY_START_HOUR || h > DAY_END_HOUR || (h == DAY_END_HOUR && m > 0) {
        return Err(AionError::InvalidTime(format!(
            "{hhmm} is outside the schedulable day ({DAY_START_HOUR:02}:00-{DAY_END_HOUR:02}:00)"
        )));
    }
    let half_hours_from_start = (h - DAY_START_HOUR) * 2 + if m >= 30 { 1 } else { 0 };
    Ok(half_hours_from_start as usize)
}

/// Format a slot index back into `"HH:MM"`.
pub fn time_of(slot: usize) -> String {
    let hour = DAY_START_HOUR as usize + slot / 2;
    let minute = if slot % 2 == 1 { 30 } else { 0 };
    format!("{hour:02}:{minute:02}")
}

fn parse_hhmm(hhmm: &str) -> Result<(u32, u32)> {
    let (h, m) = hhmm
        .split_once(':')
        .ok_or_else(|| AionError::InvalidTime(format!("{hhmm} is not HH:MM")))?;
    let h: u32 = h
        .parse()
        .map_err(|_| AionError::InvalidTime(format!("{hhmm} is not HH:MM")))?;
    let m: u32 = m
        .parse()
        .map_err(|_| AionError::InvalidTime(format!("{hhmm} is not HH:MM")))?;
    if m >= 60 {
        return Err(AionError::InvalidTime(format!("{hhmm} has an invalid minute")));
    }
    Ok((h, m))
}

/// Ceiling-divide a duration in minutes into half-hour slots. Fails on
/// non-positive durations.
pub fn duration_to_slots(minutes: i64) -> Result<usize> {
    if minutes <= 0 {
        return Err(AionError::InvalidDuration(format!(
            "duration must be positive, got {minutes}"
        )));
    }
    Ok(((minutes + 29) / 30) as usize)
}

/// Lowercase English weekday name for an ISO date.
pub fn weekday_of(date: NaiveDate) -> String {
    weekday_name(date.weekday())
}

pub fn weekday_name(weekday: Weekday) -> String {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
    .to_string()
}

/// The 7 consecutive ISO dates starting at the Monday on or before `anchor`.
pub fn week_dates(anchor: NaiveDate) -> Vec<NaiveDate> {
    let days_since_monday = anchor.weekday().num_days_from_monday();
    let monday = anchor - chrono::Duration::days(days_since_monday as i64);
    (0..7).map(|i| monday + chrono::Duration::days(i)).collect()
}

/// Does the half-open slot range `[start, start+len)` fall entirely within
/// the working-hours band `[WORKING_HOURS_START, WORKING_HOURS_END)`?
pub fn within_working_hours(start: usize, len: usize) -> bool {
    start >= WORKING_HOURS_START && start + len <= WORKING_HOURS_END
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_of_rounds_to_nearest_half_hour() {
        assert_eq!(slot_of("06:00").unwrap(), 0);
        assert_eq!(slot_of("06:29").unwrap(), 0);
        assert_eq!(slot_of("06:30").unwrap(), 1);
        assert_eq!(slot_of("09:00").unwrap(), 6);
        assert_eq!(slot_of("21:30").unwrap(), 31);
    }

    #[test]
    fn slot_of_rejects_out_of_range() {
        assert!(slot_of("05:59").is_err());
        assert!(slot_of("22:01").is_err());
        assert!(slot_of("not-a-time").is_err());
    }

    #[test]
    fn round_trip_on_half_hour_grid() {
        for h in DAY_START_HOUR..DAY_END_HOUR {
            for m in [0, 30] {
                let hhmm = format!("{h:02}:{m:02}");
                let slot = slot_of(&hhmm).unwrap();
                assert_eq!(time_of(slot), hhmm);
            }
        }
    }

    #[test]
    fn duration_to_slots_ceils() {
        assert_eq!(duration_to_slots(1).unwrap(), 1);
        assert_eq!(duration_to_slots(30).unwrap(), 1);
        assert_eq!(duration_to_slots(31).unwrap(), 2);
        assert_eq!(duration_to_slots(60).unwrap(), 2);
        assert!(duration_to_slots(0).is_err());
        assert!(duration_to_slots(-5).is_err());
    }

    #[test]
    fn week_dates_starts_on_monday() {
        let wed = NaiveDate::from_ymd_opt(2026, 2, 18).unwrap();
        let week = week_dates(wed);
        assert_eq!(week.len(), 7);
        assert_eq!(week[0].weekday(), Weekday::Mon);
        assert_eq!(week[6].weekday(), Weekday::Sun);
        assert!(week.contains(&wed));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn slot_round_trip(h in DAY_START_HOUR..DAY_END_HOUR, half in 0..2u32) {
            let m = half * 30;
            let hhmm = format!("{h:02}:{m:02}");
            let slot = slot_of(&hhmm).unwrap();
            prop_assert_eq!(time_of(slot), hhmm);
        }

        #[test]
        fn duration_monotone(m1 in 1i64..600, m2 in 1i64..600) {
            if m1 <= m2 {
                prop_assert!(duration_to_slots(m1).unwrap() <= duration_to_slots(m2).unwrap());
            }
        }
    }
}
