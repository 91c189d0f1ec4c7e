//! `aion login` — interactive Google OAuth2 authorization, or a no-op
//! message when the configured backend is SQLite.

use aion_core::config::AppConfig;

use crate::display;

pub async fn execute(config: &AppConfig) -> anyhow::Result<()> {
    aion_core::auth::login(config).await?;
    display::success("Logged in to Google Calendar.");
    Ok(())
}
