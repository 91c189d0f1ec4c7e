//! Session Memory (C10): an ephemeral, process-lifetime record of events
//! created this session, used solely to resolve anaphora like "delete
//! that". Never persisted; discarded on exit.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::event::Event;

#[derive(Debug, Clone, Default)]
pub struct SessionMemory {
    pub last_title: Option<String>,
    pub last_date: Option<NaiveDate>,
    pub created_events: Vec<Event>,
}

fn anaphoric_activity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:that|it|this|the last (?:one|event)?|last (?:one|event)?|the one)$").unwrap()
    })
}

fn anaphoric_raw_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:delete|cancel|remove|reschedule|move|update)\s+(?:that|it|this)\b").unwrap()
    })
}

impl SessionMemory {
    pub fn new() -> SessionMemory {
        SessionMemory::default()
    }

    /// Record that `event` was just the subject of a successful operation,
    /// without implying it was newly created (e.g. an update).
    pub fn record(&mut self, event: &Event) {
        self.last_title = Some(event.title.clone());
        self.last_date = Some(event.date);
    }

    /// Record a newly created event, in addition to the bookkeeping
    /// `record` does.
    pub fn record_created(&mut self, event: Event) {
        self.last_title = Some(event.title.clone());
        self.last_date = Some(event.date);
        self.created_events.push(event);
    }

    /// Does `activity` or `raw` refer anaphorically to the last
    /// remembered event?
    pub fn is_anaphoric(activity: Option<&str>, raw: &str) -> bool {
        activity.is_some_and(|a| anaphoric_activity_regex().is_match(a.trim()))
            || anaphoric_raw_regex().is_match(raw)
    }

    /// Resolve an anaphoric reference into `(title, date)`, using the
    /// remembered title and falling back to the remembered date only if
    /// the caller doesn't already have one. Returns `None` if memory is
    /// empty — callers should report "no recent event" in that case.
    pub fn resolve(&self, existing_date: Option<NaiveDate>) -> Option<(String, Option<NaiveDate>)> {
        let title = self.last_title.clone()?;
        let date = existing_date.or(self.last_date);
        Some((title, date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Category;

    fn event(title: &str, date: NaiveDate) -> Event {
        Event {
            id: "e1".into(),
            title: title.into(),
            date,
            time: "09:00".into(),
            duration_minutes: 60,
            description: String::new(),
            category: Category::Other,
        }
    }

    #[test]
    fn empty_memory_resolves_to_none() {
        let memory = SessionMemory::new();
        assert!(memory.resolve(None).is_none());
    }

    #[test]
    fn record_created_remembers_title_and_date() {
        let mut memory = SessionMemory::new();
        let date = NaiveDate::from_ymd_opt(2026, 2, 18).unwrap();
        memory.record_created(event("gym", date));
        assert_eq!(memory.created_events.len(), 1);
        let (title, resolved_date) = memory.resolve(None).unwrap();
        assert_eq!(title, "gym");
        assert_eq!(resolved_date, Some(date));
    }

    #[test]
    fn is_anaphoric_matches_bare_pronoun_activity() {
        assert!(SessionMemory::is_anaphoric(Some("that"), "delete that"));
        assert!(SessionMemory::is_anaphoric(Some("the last one"), "x"));
        assert!(!SessionMemory::is_anaphoric(Some("gym"), "delete gym"));
    }

    #[test]
    fn is_anaphoric_matches_verb_plus_pronoun_in_raw_text() {
        assert!(SessionMemory::is_anaphoric(None, "cancel it"));
        assert!(SessionMemory::is_anaphoric(None, "move this to 3pm"));
        assert!(!SessionMemory::is_anaphoric(None, "cancel the gym session"));
    }

    #[test]
    fn existing_date_wins_over_remembered_date() {
        let mut memory = SessionMemory::new();
        let remembered = NaiveDate::from_ymd_opt(2026, 2, 18).unwrap();
        memory.record_created(event("gym", remembered));
        let explicit = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        let (_, date) = memory.resolve(Some(explicit)).unwrap();
        assert_eq!(date, Some(explicit));
    }
}
