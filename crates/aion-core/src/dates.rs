//! Turns a natural-language fragment into zero or more absolute dates plus
//! a human-readable label, the way a user would expect when they type
//! "next friday" or "this week" into a calendar prompt.
//!
//! Resolution order matters and is a first-match-wins cascade; see
//! [`resolve`].

use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    Date,
    Week,
    Month,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateResolution {
    pub kind: DateKind,
    pub dates: Vec<NaiveDate>,
    pub label: String,
}

impl DateResolution {
    fn none() -> Self {
        DateResolution {
            kind: DateKind::None,
            dates: Vec::new(),
            label: String::new(),
        }
    }
}

const MONTH_NAMES: &[(&str, u32)] = &[
    ("january", 1), ("jan", 1),
    ("february", 2), ("feb", 2),
    ("march", 3), ("mar", 3),
    ("april", 4), ("apr", 4),
    ("may", 5),
    ("june", 6), ("jun", 6),
    ("july", 7), ("jul", 7),
    ("august", 8), ("aug", 8),
    ("september", 9), ("sep", 9), ("sept", 9),
    ("october", 10), ("oct", 10),
    ("november", 11), ("nov", 11),
    ("december", 12), ("dec", 12),
];

/// Ordered so a longer alias (e.g. "thurs") is matched before a shorter
/// prefix of it would be; declaration order mirrors the source dictionary.
const WEEKDAY_NAMES: &[(&str, u32)] = &[
    ("sunday", 6), ("sun", 6),
    ("monday", 0), ("mon", 0),
    ("tuesday", 1), ("tues", 1), ("tue", 1),
    ("wednesday", 2), ("wed", 2),
    ("thursday", 3), ("thurs", 3), ("thur", 3), ("thu", 3),
    ("friday", 4), ("fri", 4),
    ("saturday", 5), ("sat", 5),
];

const TYPOS: &[(&str, &str)] = &[
    ("tommorow", "tomorrow"), ("tomorow", "tomorrow"), ("tmrw", "tomorrow"), ("tmr", "tomorrow"),
    ("tomorroow", "tomorrow"), ("tomorrw", "tomorrow"), ("2morrow", "tomorrow"),
    ("yesteday", "yesterday"), ("ysterday", "yesterday"), ("yesterdy", "yesterday"),
    ("wenesday", "wednesday"), ("wensday", "wednesday"), ("wedensday", "wednesday"),
    ("thurday", "thursday"), ("thrusday", "thursday"), ("tusday", "tuesday"), ("tueday", "tuesday"),
    ("firday", "friday"), ("saterday", "saturday"), ("satruday", "saturday"),
    ("satuday", "saturday"), ("munday", "monday"), ("mondy", "monday"),
    ("sundya", "sunday"), ("suday", "sunday"),
];

fn typo_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alternation = TYPOS
            .iter()
            .map(|(k, _)| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"(?i)\b({alternation})\b")).unwrap()
    })
}

fn date_pattern_name_first() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\w+)\s+(\d{1,2})(?:st|nd|rd|th)?(?:\s*,?\s*(\d{4}))?").unwrap())
}

fn date_pattern_day_first() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d{1,2})(?:st|nd|rd|th)?\s+(?:of\s+)?(\w+)(?:\s*,?\s*(\d{4}))?").unwrap()
    })
}

/// Normalize a fixed dictionary of common date-word misspellings (e.g.
/// "tmrw" -> "tomorrow"). Public so other text-consuming stages (the rule
/// parser's activity extraction) can normalize before their own ablation,
/// matching the original's `_fix_typos(text.strip())` at the top of both
/// `classify()` and the entity extractor.
pub fn fix_typos(text: &str) -> String {
    typo_pattern()
        .replace_all(text, |caps: &regex::Captures| {
            let matched = caps[1].to_lowercase();
            TYPOS
                .iter()
                .find(|(k, _)| *k == matched)
                .map(|(_, v)| v.to_string())
                .unwrap_or(matched)
        })
        .into_owned()
}

fn month_num(name: &str) -> Option<u32> {
    MONTH_NAMES.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
}

/// Resolve a free-text fragment against `today` (the caller's timezone-local
/// "now", so tests can pin it). First match in the cascade wins.
pub fn resolve(message: &str, today: NaiveDate) -> DateResolution {
    let message_lower = fix_typos(&message.to_lowercase());

    if message_lower.contains("today") {
        return DateResolution {
            kind: DateKind::Date,
            dates: vec![today],
            label: format!("today ({})", today.format("%B %d, %Y")),
        };
    }

    if message_lower.contains("tomorrow") {
        let d = today + Duration::days(1);
        return DateResolution {
            kind: DateKind::Date,
            dates: vec![d],
            label: format!("tomorrow ({})", d.format("%B %d, %Y")),
        };
    }

    if message_lower.contains("yesterday") {
        let d = today - Duration::days(1);
        return DateResolution {
            kind: DateKind::Date,
            dates: vec![d],
            label: format!("yesterday ({})", d.format("%B %d, %Y")),
        };
    }

    if message_lower.contains("this week") {
        let start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        let dates: Vec<NaiveDate> = (0..7).map(|i| start + Duration::days(i)).collect();
        let end = start + Duration::days(6);
        return DateResolution {
            kind: DateKind::Week,
            dates,
            label: format!(
                "this week ({} - {})",
                start.format("%b %d"),
                end.format("%b %d")
            ),
        };
    }

    if message_lower.contains("next week") {
        let start = today + Duration::days(7 - today.weekday().num_days_from_monday() as i64);
        let dates: Vec<NaiveDate> = (0..7).map(|i| start + Duration::days(i)).collect();
        let end = start + Duration::days(6);
        return DateResolution {
            kind: DateKind::Week,
            dates,
            label: format!(
                "next week ({} - {})",
                start.format("%b %d"),
                end.format("%b %d")
            ),
        };
    }

    // Specific weekday — "next friday" vs "friday".
    for (day_name, day_num) in WEEKDAY_NAMES {
        if contains_word(&message_lower, day_name) {
            let today_num = today.weekday().num_days_from_monday() as i64;
            let mut days_ahead = *day_num as i64 - today_num;
            if message_lower.contains("next") {
                days_ahead += 7;
            }
            if days_ahead <= 0 {
                days_ahead += 7;
            }
            let target = today + Duration::days(days_ahead);
            return DateResolution {
                kind: DateKind::Date,
                dates: vec![target],
                label: format!("{} ({})", capitalize(day_name), target.format("%B %d, %Y")),
            };
        }
    }

    // Explicit "Month Day[, Year]" or "Day of Month" — checked before bare month names.
    for (pattern, name_first) in [(date_pattern_name_first(), true), (date_pattern_day_first(), false)] {
        if let Some(caps) = pattern.captures(&message_lower) {
            let (month_str, day_str) = if name_first {
                (caps.get(1).unwrap().as_str(), caps.get(2).unwrap().as_str())
            } else {
                (caps.get(2).unwrap().as_str(), caps.get(1).unwrap().as_str())
            };
            let year_str = caps.get(3).map(|m| m.as_str());

            if let (Some(month), Ok(day)) = (month_num(month_str), day_str.parse::<u32>()) {
                let explicit_year = year_str.and_then(|y| y.parse::<i32>().ok());
                let mut year = explicit_year.unwrap_or_else(|| today.year());
                if explicit_year.is_none() && month < today.month() {
                    year += 1;
                }
                if let Some(target) = NaiveDate::from_ymd_opt(year, month, day) {
                    return DateResolution {
                        kind: DateKind::Date,
                        dates: vec![target],
                        label: target.format("%B %d, %Y").to_string(),
                    };
                }
            }
        }
    }

    // Bare month name → every date in that month.
    for (month_name, month_num) in MONTH_NAMES {
        if message_lower.contains(month_name) {
            let mut year = today.year();
            if *month_num < today.month() {
                year += 1;
            }
            let days_in_month = days_in_month(year, *month_num);
            let dates = (1..=days_in_month)
                .filter_map(|d| NaiveDate::from_ymd_opt(year, *month_num, d))
                .collect();
            return DateResolution {
                kind: DateKind::Month,
                dates,
                label: format!("{} {}", capitalize(month_name), year),
            };
        }
    }

    DateResolution::none()
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.split(|c: char| !c.is_alphanumeric()).any(|w| w == word)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next_month_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .unwrap();
    let this_month_first = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    (next_month_first - this_month_first).num_days() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn today_and_tomorrow() {
        let today = ymd(2026, 2, 18); // a Wednesday
        assert_eq!(resolve("what's on today", today).dates, vec![today]);
        assert_eq!(
            resolve("schedule gym tomorrow", today).dates,
            vec![ymd(2026, 2, 19)]
        );
    }

    #[test]
    fn next_friday_always_skips_a_week() {
        // Wednesday Feb 18 2026: plain "friday" should be Feb 20 (this week).
        let today = ymd(2026, 2, 18);
        assert_eq!(resolve("friday", today).dates, vec![ymd(2026, 2, 20)]);
        // "next friday" always skips to the following week.
        assert_eq!(resolve("next friday", today).dates, vec![ymd(2026, 2, 27)]);
    }

    #[test]
    fn weekday_in_the_past_rolls_to_next_week() {
        // Friday Feb 20 2026, ask for "wednesday" (already passed this week).
        let today = ymd(2026, 2, 20);
        assert_eq!(resolve("wednesday", today).dates, vec![ymd(2026, 2, 25)]);
    }

    #[test]
    fn typo_correction() {
        let today = ymd(2026, 2, 18);
        assert_eq!(
            resolve("schedule gym tmrw", today).dates,
            vec![ymd(2026, 2, 19)]
        );
    }

    #[test]
    fn explicit_month_day() {
        let today = ymd(2026, 2, 18);
        assert_eq!(resolve("march 3", today).dates, vec![ymd(2026, 3, 3)]);
        assert_eq!(resolve("3rd of march", today).dates, vec![ymd(2026, 3, 3)]);
    }

    #[test]
    fn explicit_month_day_in_past_rolls_to_next_year() {
        let today = ymd(2026, 2, 18);
        assert_eq!(resolve("january 5", today).dates, vec![ymd(2027, 1, 5)]);
    }

    #[test]
    fn bare_month_expands_to_every_day() {
        let today = ymd(2026, 2, 18);
        let r = resolve("march", today);
        assert_eq!(r.kind, DateKind::Month);
        assert_eq!(r.dates.len(), 31);
        assert_eq!(r.dates[0], ymd(2026, 3, 1));
        assert_eq!(r.dates[30], ymd(2026, 3, 31));
    }

    #[test]
    fn idempotent_on_explicit_iso_style_request() {
        // Resolving a date already pinned down should yield exactly one date.
        let today = ymd(2026, 2, 18);
        let r = resolve("today", today);
        assert_eq!(r.dates.len(), 1);
    }

    #[test]
    fn no_match_returns_none_kind() {
        let today = ymd(2026, 2, 18);
        let r = resolve("schedule a gym session", today);
        assert_eq!(r.kind, DateKind::None);
        assert!(r.dates.is_empty());
    }
}
