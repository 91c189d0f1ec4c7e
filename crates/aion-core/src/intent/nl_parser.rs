//! The port onto an external natural-language classifier (C5). The only
//! implementation shipped is [`crate::intent::ollama::OllamaParser`], but
//! keeping this as a trait lets the pipeline swap parsers or stub one out
//! in tests without touching call sites.

use async_trait::async_trait;

use crate::error::Result;
use crate::event::Event;
use crate::intent::Command;

/// An external classifier that can turn free text into one or more
/// [`Command`]s. Implementations should fail with
/// [`crate::error::AionError::ParserUnavailable`] or
/// [`crate::error::AionError::ParserDecode`] for conditions the pipeline
/// should silently fall back from, and any other error for conditions
/// worth surfacing.
#[async_trait]
pub trait NLParser: Send + Sync {
    /// Parse `text` into one or more commands. `events` gives the parser a
    /// window into the user's upcoming calendar so it can resolve
    /// references like "move it" or judge which existing event "cancel
    /// gym" refers to; pass an empty slice when no context is available.
    async fn parse(&self, text: &str, events: &[Event]) -> Result<Vec<Command>>;

    /// Whether this parser is currently reachable. The pipeline checks
    /// this before attempting `parse` so a down parser doesn't cost a
    /// request round-trip on every single input.
    async fn is_available(&self) -> bool;
}
