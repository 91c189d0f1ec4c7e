//! Crate-wide error taxonomy.
//!
//! Every fallible boundary in the core (slot arithmetic, date resolution,
//! the solver, the event store, the NL parser, config I/O) ultimately
//! produces an [`AionError`]. The variant names match the error kinds named
//! in the component design, not arbitrary Rust types, so a caller can match
//! on the kind without reaching into `#[source]`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AionError {
    #[error("invalid time: {0}")]
    InvalidTime(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("no available slots for this request")]
    Unsatisfiable,

    #[error("could not encode the scheduling request: {0}")]
    Grounding(String),

    #[error("your session with the calendar provider expired, run `login` again")]
    AuthExpired,

    #[error("network error talking to the calendar provider: {0}")]
    Network(String),

    #[error("calendar backend error: {0}")]
    Backend(String),

    #[error("event not found: {0}")]
    NotFound(String),

    #[error("the natural-language parser is unavailable")]
    ParserUnavailable,

    #[error("the natural-language parser returned something we couldn't decode: {0}")]
    ParserDecode(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AionError {
    /// True for errors the NL pipeline should absorb and fall back from,
    /// rather than surface to the user.
    pub fn is_parser_fallback(&self) -> bool {
        matches!(
            self,
            AionError::ParserUnavailable | AionError::ParserDecode(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AionError>;
