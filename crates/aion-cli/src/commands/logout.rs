//! `aion logout` — discards any stored Google OAuth2 tokens.

use crate::display;

pub fn execute() -> anyhow::Result<()> {
    aion_core::auth::logout()?;
    display::success("Logged out.");
    Ok(())
}
