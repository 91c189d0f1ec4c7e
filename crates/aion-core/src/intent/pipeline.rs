//! The Intent Pipeline (C7): tries the NL parser first when it's enabled
//! and reachable, and falls back to the rule parser on any parser-level
//! failure. The fallback is silent by design — a flaky local Ollama
//! daemon should degrade the experience, not surface an error to the
//! user typing a calendar command.

use chrono::NaiveDate;

use crate::error::Result;
use crate::event::Event;
use crate::intent::nl_parser::NLParser;
use crate::intent::rule_parser;
use crate::intent::Command;

pub struct IntentPipeline<P: NLParser> {
    nl_parser: Option<P>,
}

impl<P: NLParser> IntentPipeline<P> {
    pub fn new(nl_parser: Option<P>) -> IntentPipeline<P> {
        IntentPipeline { nl_parser }
    }

    /// Parse `text` into one or more commands, given `today` (the
    /// caller's local date) and `events` for context the NL parser can
    /// use to resolve ambiguous references.
    pub async fn parse(&self, text: &str, today: NaiveDate, events: &[Event]) -> Result<Vec<Command>> {
        if let Some(parser) = &self.nl_parser {
            if parser.is_available().await {
                match parser.parse(text, events).await {
                    Ok(commands) if !commands.is_empty() => return Ok(commands),
                    Ok(_) => {}
                    Err(e) if e.is_parser_fallback() => {
                        tracing::debug!(error = %e, "nl parser fell back to rule parser");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(vec![rule_parser::classify(text, today)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::CommandIntent;
    use async_trait::async_trait;

    struct AlwaysUnavailable;

    #[async_trait]
    impl NLParser for AlwaysUnavailable {
        async fn parse(&self, _text: &str, _events: &[Event]) -> Result<Vec<Command>> {
            unreachable!("should never be called when unavailable")
        }

        async fn is_available(&self) -> bool {
            false
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl NLParser for AlwaysFails {
        async fn parse(&self, _text: &str, _events: &[Event]) -> Result<Vec<Command>> {
            Err(crate::error::AionError::ParserUnavailable)
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 18).unwrap()
    }

    #[tokio::test]
    async fn falls_back_to_rule_parser_when_unavailable() {
        let pipeline = IntentPipeline::new(Some(AlwaysUnavailable));
        let commands = pipeline.parse("schedule gym tomorrow", today(), &[]).await.unwrap();
        assert_eq!(commands.len(), 1);
        assert!(matches!(commands[0].intent, CommandIntent::Schedule { .. }));
    }

    #[tokio::test]
    async fn falls_back_to_rule_parser_on_parser_error() {
        let pipeline = IntentPipeline::new(Some(AlwaysFails));
        let commands = pipeline.parse("schedule gym tomorrow", today(), &[]).await.unwrap();
        assert_eq!(commands.len(), 1);
        assert!(matches!(commands[0].intent, CommandIntent::Schedule { .. }));
    }

    #[tokio::test]
    async fn uses_rule_parser_directly_when_no_nl_parser_configured() {
        let pipeline: IntentPipeline<AlwaysUnavailable> = IntentPipeline::new(None);
        let commands = pipeline.parse("help", today(), &[]).await.unwrap();
        assert!(matches!(commands[0].intent, CommandIntent::Help));
    }
}
