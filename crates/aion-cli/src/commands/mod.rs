//! One-shot CLI verbs: `login`, `logout`, `setup`, `settings`. Each is a
//! thin wrapper that loads its own dependencies and renders through
//! [`crate::display`]; the interactive REPL (`crate::repl`) reuses the
//! same core entry points for its own `login`/`logout`/`setup`/`settings`
//! verbs.

pub mod login;
pub mod logout;
pub mod settings;
pub mod setup;
