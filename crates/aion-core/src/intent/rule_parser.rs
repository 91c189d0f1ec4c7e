//! The Rule Parser (C6): an offline regex-driven classifier and entity
//! extractor. Always available; produces the same [`Command`] shape the
//! NL Parser does, so the pipeline can swap between them freely.
//!
//! The "strip everything until what remains is the activity" ablation
//! approach below is fragile by construction — it's the documented
//! fallback path, not the primary source of truth when an NL parser is
//! available.

use std::sync::OnceLock;

use regex::Regex;

use crate::dates::{self, DateKind};
use crate::intent::{Command, CommandIntent};
use crate::preferences::TimeBias;

/// (intent name, pattern, priority) in declaration order; first match in
/// this order wins, and the order itself carries the priority — it is
/// not resorted by the `priority` field at runtime.
struct IntentPattern {
    name: &'static str,
    regex: fn() -> &'static Regex,
    #[allow(dead_code)]
    priority: u8,
}

fn help_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:help|commands|what can you do|how do(?:es)? (?:this|it) work)\s*\??$").unwrap()
    })
}
fn preferences_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:preferences?|settings?|blocked?\s*(?:slots?|times?)?|configure)\b").unwrap())
}
fn find_optimal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:best\s+time|optimal|when\s+should\s+i|suggest|recommend)\b").unwrap())
}
fn find_free_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:free|available|open\s+slots?|when\s+am\s+i\s+free)\b").unwrap())
}
fn delete_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:delete|cancel|remove)\b").unwrap())
}
fn update_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:move|change|reschedule|update|push\s+back|bring\s+forward)\b").unwrap())
}
fn schedule_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:schedule|add|create|book|set\s+up|plan)\b").unwrap())
}
fn list_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:list|show|what'?s\s+on|events|calendar|plans|agenda|what\s+(?:do\s+)?i\s+have|check\s+(?:my\s+)?(?:calendar|events|schedule)|is\s+there\s+anything|anything\s+(?:on|today|tomorrow)|do\s+i\s+have|what\s+(?:event|meeting)|have\s+i\s+got|what'?s\s+(?:on\s+)?(?:my\s+)?(?:today|tomorrow|schedule)|what\s+(?:about\s+|(?:is\s+)?(?:there\s+|happening\s+)?(?:on\s+|in\s+|for\s+)?)?(?:today|tomorrow|(?:this|next)\s+week|(?:next\s+)?(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)))\b",
        )
        .unwrap()
    })
}

const INTENT_PATTERNS: &[IntentPattern] = &[
    IntentPattern { name: "HELP", regex: help_regex, priority: 10 },
    IntentPattern { name: "PREFERENCES", regex: preferences_regex, priority: 8 },
    IntentPattern { name: "FIND_OPTIMAL", regex: find_optimal_regex, priority: 9 },
    IntentPattern { name: "FIND_FREE", regex: find_free_regex, priority: 8 },
    IntentPattern { name: "DELETE", regex: delete_regex, priority: 7 },
    IntentPattern { name: "UPDATE", regex: update_regex, priority: 7 },
    IntentPattern { name: "SCHEDULE", regex: schedule_regex, priority: 6 },
    IntentPattern { name: "LIST", regex: list_regex, priority: 5 },
];

fn time_12h_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bat\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b").unwrap())
}
fn time_24h_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bat\s+(\d{1,2}):(\d{2})\b").unwrap())
}
fn time_bare_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bat\s+(\d{1,2})\b").unwrap())
}
fn time_bare_excluded_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:am|pm|:\d|hours?|hrs?|h\b|minutes?|mins?|m\b)").unwrap()
    })
}
fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:for\s+)?(\d+(?:\.\d+)?)\s*[-\s]*(hours?|hrs?|h|minutes?|mins?|m)\b").unwrap())
}
fn duration_short_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*(h|hr|hrs|min|mins)\b").unwrap())
}
fn time_pref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(morning|afternoon|evening|night)\b").unwrap())
}
fn label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)\b(?:called|named|titled?|as)\s+["']?(.+?)["']?\s*$"#).unwrap())
}
fn for_activity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bfor\s+(\w[\w\s]*?)\s*$").unwrap())
}
fn duration_value_prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^[\d.]+\s*(?:hour|hr|h|min|m)\b").unwrap())
}
fn preamble_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:(?:can|could|would)\s+you\s+(?:please\s+)?|please\s+|I\s+(?:want\s+to|need\s+to|'d\s+like\s+to)\s+)").unwrap()
    })
}
fn filler_words_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:a|an|the|my|me)\b").unwrap())
}
fn trailing_preposition_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:at|on|for|from|to|in\s+the)\b\s*$").unwrap())
}
fn month_mention_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\s*\d{0,2}(?:st|nd|rd|th)?\b").unwrap()
    })
}
fn weekday_mention_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:next\s+)?(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b").unwrap()
    })
}
fn relative_date_mention_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:today|tomorrow|yesterday|this\s+week|next\s+week)\b").unwrap())
}

pub(crate) fn extract_time(text: &str) -> Option<String> {
    if let Some(caps) = time_12h_regex().captures(text) {
        let mut hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps.get(2).map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);
        let ampm = caps[3].to_lowercase();
        if ampm == "pm" && hour != 12 {
            hour += 12;
        } else if ampm == "am" && hour == 12 {
            hour = 0;
        }
        return Some(format!("{hour:02}:{minute:02}"));
    }
    if let Some(caps) = time_24h_regex().captures(text) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps[2].parse().ok()?;
        return Some(format!("{hour:02}:{minute:02}"));
    }
    for caps in time_bare_regex().captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let rest = &text[whole.end()..];
        if time_bare_excluded_regex().is_match(rest) {
            continue;
        }
        let mut hour: u32 = caps[1].parse().ok()?;
        // Bare-hour heuristic: nobody schedules "at 2" meaning 2am.
        if (1..=6).contains(&hour) {
            hour += 12;
        }
        if hour <= 23 {
            return Some(format!("{hour:02}:00"));
        }
    }
    None
}

fn extract_duration(text: &str) -> Option<i64> {
    let caps = duration_regex().captures(text).or_else(|| duration_short_regex().captures(text))?;
    let value: f64 = caps[1].parse().ok()?;
    let unit = caps[2].to_lowercase();
    Some(if unit.starts_with('h') {
        (value * 60.0) as i64
    } else {
        value as i64
    })
}

fn extract_time_pref(text: &str) -> Option<TimeBias> {
    let caps = time_pref_regex().captures(text)?;
    match caps[1].to_lowercase().as_str() {
        "morning" => Some(TimeBias::Morning),
        "afternoon" => Some(TimeBias::Afternoon),
        "evening" | "night" => Some(TimeBias::Evening),
        _ => None,
    }
}

/// Returns `(label, text_with_label_stripped)`.
fn extract_label(text: &str) -> (Option<String>, String) {
    if let Some(caps) = label_regex().captures(text) {
        let whole = caps.get(0).unwrap();
        let label = caps[1].trim_matches(|c| c == '"' || c == '\'').to_string();
        let cleaned = text[..whole.start()].trim().to_string();
        (Some(label), cleaned)
    } else {
        (None, text.to_string())
    }
}

fn extract_for_activity(text: &str) -> Option<String> {
    let caps = for_activity_regex().captures(text)?;
    let candidate = caps[1].trim();
    if duration_value_prefix_regex().is_match(candidate) {
        None
    } else {
        Some(candidate.to_string())
    }
}

fn verb_pattern_for(intent: &str) -> Option<&'static Regex> {
    fn re(pattern: &str) -> Regex {
        Regex::new(pattern).unwrap()
    }
    macro_rules! cached {
        ($pattern:expr) => {{
            static RE: OnceLock<Regex> = OnceLock::new();
            Some(RE.get_or_init(|| re($pattern)))
        }};
    }
    match intent {
        "SCHEDULE" => cached!(r"(?i)^(?:schedule|add|create|book|set\s+up|plan)\s+"),
        "DELETE" => cached!(r"(?i)^(?:delete|cancel|remove)\s+"),
        "UPDATE" => cached!(r"(?i)^(?:move|change|reschedule|update)\s+"),
        "FIND_OPTIMAL" => {
            cached!(r"(?i)^(?:find\s+(?:the\s+)?best\s+time\s+for\s+(?:a\s+)?|suggest\s+(?:a\s+)?time\s+for\s+(?:a\s+)?|when\s+should\s+i\s+)")
        }
        _ => None,
    }
}

fn extract_activity(text: &str, intent: &str) -> Option<String> {
    let text = dates::fix_typos(text);
    let mut cleaned = preamble_regex().replace(&text, "").trim().to_string();

    let for_activity = extract_for_activity(&cleaned);

    if let Some(verb) = verb_pattern_for(intent) {
        cleaned = verb.replace(&cleaned, "").to_string();
    }

    cleaned = time_12h_regex().replace_all(&cleaned, "").to_string();
    cleaned = time_24h_regex().replace_all(&cleaned, "").to_string();
    cleaned = time_bare_regex().replace_all(&cleaned, "").to_string();
    cleaned = duration_regex().replace_all(&cleaned, "").to_string();
    cleaned = duration_short_regex().replace_all(&cleaned, "").to_string();
    cleaned = time_pref_regex().replace_all(&cleaned, "").to_string();
    cleaned = relative_date_mention_regex().replace_all(&cleaned, "").to_string();
    cleaned = weekday_mention_regex().replace_all(&cleaned, "").to_string();
    cleaned = month_mention_regex().replace_all(&cleaned, "").to_string();
    cleaned = trailing_preposition_regex().replace(&cleaned, "").to_string();

    cleaned = filler_words_regex().replace_all(&cleaned, "").to_string();
    cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    cleaned = cleaned.trim_matches(|c: char| " ,.-?!".contains(c)).to_string();

    if cleaned.is_empty() {
        if let Some(ref candidate) = for_activity {
            cleaned = candidate.clone();
        }
    } else if let Some(ref candidate) = for_activity {
        if cleaned.split_whitespace().count() > 3 && !candidate.is_empty() {
            cleaned = candidate.clone();
        }
    }

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Classify raw text into a [`Command`] using regex alone. Always
/// available, never fails.
pub fn classify(user_input: &str, today: chrono::NaiveDate) -> Command {
    let trimmed = user_input.trim();
    if trimmed.is_empty() {
        return Command::unknown(trimmed.to_string(), 0.0);
    }
    let normalized = dates::fix_typos(trimmed);

    let mut intent_name = "UNKNOWN";
    let mut confidence = 0.0_f64;
    for pattern in INTENT_PATTERNS {
        if (pattern.regex)().is_match(&normalized) {
            intent_name = pattern.name;
            confidence = 0.9;
            break;
        }
    }

    let (label, text_for_activity) = extract_label(&normalized);
    let date_resolution = dates::resolve(&normalized, today);
    let time = extract_time(&normalized);
    let duration_minutes = extract_duration(&normalized);
    let time_bias = extract_time_pref(&normalized);
    let activity = if matches!(intent_name, "SCHEDULE" | "DELETE" | "UPDATE" | "FIND_OPTIMAL") {
        extract_activity(&text_for_activity, intent_name)
    } else {
        None
    };

    let has_entity = !date_resolution.dates.is_empty() || time.is_some() || activity.is_some();
    if intent_name != "UNKNOWN" && has_entity {
        confidence = (confidence + 0.1).min(1.0);
    }
    if intent_name == "UNKNOWN" {
        confidence = 0.3;
    }

    let dates_vec = date_resolution.dates.clone();
    let date_label = if date_resolution.kind == DateKind::None {
        String::new()
    } else {
        date_resolution.label.clone()
    };

    let intent = match intent_name {
        "HELP" => CommandIntent::Help,
        "PREFERENCES" => CommandIntent::Preferences,
        "FIND_OPTIMAL" => CommandIntent::FindOptimal {
            activity: activity.unwrap_or_default(),
            dates: dates_vec,
            duration_minutes,
            time_bias,
        },
        "FIND_FREE" => CommandIntent::FindFree {
            dates: dates_vec,
            duration_minutes,
        },
        "DELETE" => CommandIntent::Delete {
            activity,
            label,
            dates: dates_vec,
        },
        "UPDATE" => CommandIntent::Update {
            activity,
            label,
            dates: dates_vec,
            time,
            duration_minutes,
        },
        "SCHEDULE" => CommandIntent::Schedule {
            activity: activity.unwrap_or_default(),
            label,
            dates: dates_vec,
            date_label,
            time,
            duration_minutes,
            time_bias,
        },
        "LIST" => CommandIntent::List {
            dates: dates_vec,
            date_label,
        },
        _ => CommandIntent::Unknown,
    };

    Command {
        intent,
        confidence,
        raw: trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 18).unwrap()
    }

    // S6: bare hour heuristic.
    #[test]
    fn bare_hour_heuristic() {
        let cmd = classify("schedule meeting at 2", today());
        match cmd.intent {
            CommandIntent::Schedule { time, .. } => assert_eq!(time.as_deref(), Some("14:00")),
            other => panic!("unexpected intent: {other:?}"),
        }

        let cmd = classify("schedule run at 9", today());
        match cmd.intent {
            CommandIntent::Schedule { time, .. } => assert_eq!(time.as_deref(), Some("09:00")),
            other => panic!("unexpected intent: {other:?}"),
        }
    }

    #[test]
    fn twelve_hour_time_is_parsed() {
        let cmd = classify("schedule gym at 3:30pm", today());
        match cmd.intent {
            CommandIntent::Schedule { time, .. } => assert_eq!(time.as_deref(), Some("15:30")),
            other => panic!("unexpected intent: {other:?}"),
        }
    }

    #[test]
    fn schedule_intent_extracts_activity() {
        let cmd = classify("schedule gym tomorrow", today());
        match cmd.intent {
            CommandIntent::Schedule { activity, .. } => assert_eq!(activity, "gym"),
            other => panic!("unexpected intent: {other:?}"),
        }
    }

    #[test]
    fn delete_intent_matches() {
        let cmd = classify("cancel my dentist appointment", today());
        assert!(matches!(cmd.intent, CommandIntent::Delete { .. }));
    }

    #[test]
    fn find_free_intent_matches() {
        let cmd = classify("when am I free tomorrow?", today());
        assert!(matches!(cmd.intent, CommandIntent::FindFree { .. }));
    }

    #[test]
    fn label_extraction() {
        let cmd = classify("schedule workout at 6am called Morning Lift", today());
        match cmd.intent {
            CommandIntent::Schedule { label, .. } => assert_eq!(label.as_deref(), Some("Morning Lift")),
            other => panic!("unexpected intent: {other:?}"),
        }
    }

    #[test]
    fn empty_input_is_unknown_with_zero_confidence() {
        let cmd = classify("   ", today());
        assert_eq!(cmd.confidence, 0.0);
        assert!(matches!(cmd.intent, CommandIntent::Unknown));
    }

    #[test]
    fn unmatched_intent_has_low_confidence() {
        let cmd = classify("the weather is nice", today());
        assert_eq!(cmd.confidence, 0.3);
    }

    #[test]
    fn duration_extraction() {
        let cmd = classify("schedule gym for 2 hours tomorrow", today());
        match cmd.intent {
            CommandIntent::Schedule { duration_minutes, .. } => assert_eq!(duration_minutes, Some(120)),
            other => panic!("unexpected intent: {other:?}"),
        }
    }
}
