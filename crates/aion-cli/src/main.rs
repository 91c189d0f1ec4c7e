//! `aion` — the CLI entry point. Wires the Configuration Layer, an Event
//! Store adapter chosen by `AppConfig::backend`, and the interactive REPL
//! (or a one-shot verb) together, installing the ambient observability
//! layer (C16) before anything else runs.

mod commands;
mod display;
mod output;
mod prompter;
mod repl;

use std::path::PathBuf;

use aion_core::config::{AppConfig, Backend};
use aion_core::event::EventStore;
use aion_core::store::google::GoogleCalendarStore;
use aion_core::store::sqlite::SqliteEventStore;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "aion", about = "AI-assisted personal calendar agent")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override the config file path instead of the per-OS default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect a Google Calendar account via OAuth2.
    Login,
    /// Disconnect the current Google Calendar account.
    Logout,
    /// Install and configure Ollama for smart command understanding.
    Setup,
    /// View or edit preferences (blocked times, default time bias, Ollama toggle).
    Settings(SettingsArgs),
}

#[derive(clap::Args)]
struct SettingsArgs {
    /// Print current preferences and exit.
    #[arg(long)]
    show: bool,
    /// Set one preference directly: KEY=VALUE.
    #[arg(long)]
    set: Option<String>,
    /// Print preferences as JSON instead of human-readable text (with --show).
    #[arg(long)]
    json: bool,
}

fn preferences_path() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("aion").join("preferences.json")
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    output::reset_sigpipe();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        display::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    match cli.command {
        Some(Commands::Login) => return commands::login::execute(&config).await,
        Some(Commands::Logout) => return commands::logout::execute(),
        Some(Commands::Setup) => return commands::setup::execute(&mut config).await,
        Some(Commands::Settings(args)) => return run_settings(args).await,
        None => {}
    }

    let store: Box<dyn EventStore> = match config.backend {
        Backend::Sqlite => Box::new(SqliteEventStore::connect(&config.sqlite_path).await?),
        Backend::Google => Box::new(GoogleCalendarStore::new(&config)?),
    };

    repl::run(store.as_ref(), &mut config, &preferences_path()).await
}

async fn run_settings(args: SettingsArgs) -> anyhow::Result<()> {
    let path = preferences_path();
    let mut prefs = aion_core::preferences::Preferences::load(&path)?;

    if args.show {
        if args.json {
            output::write_stdout(&serde_json::to_string(&prefs)?)?;
        } else {
            let today = chrono::Local::now().date_naive();
            commands::settings::show(&prefs, prefs.nl_parser_enabled, today);
        }
        return Ok(());
    }

    if let Some(kv) = &args.set {
        return commands::settings::set_direct(&mut prefs, kv, &path);
    }

    use std::io::IsTerminal;
    if !std::io::stdin().is_terminal() {
        anyhow::bail!("interactive preferences editor requires a terminal; use --show or --set KEY=VALUE");
    }
    commands::settings::interactive_menu(&mut prefs, &path)
}
