//! `aion setup` — auto-installs Ollama and pulls the configured model for
//! smart intent classification, mirroring the original's `setup.py` flow.

use std::process::Stdio;
use std::time::Duration;

use aion_core::config::AppConfig;
use tokio::process::Command;
use tokio::time::sleep;

use crate::display;

const POLL_ATTEMPTS: u32 = 20;
const POLL_INTERVAL: Duration = Duration::from_millis(500);
const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);
const PULL_TIMEOUT: Duration = Duration::from_secs(600);

async fn is_installed() -> bool {
    Command::new("ollama").arg("--version").stdout(Stdio::null()).stderr(Stdio::null()).status().await.map(|s| s.success()).unwrap_or(false)
}

async fn is_running(base_url: &str) -> bool {
    reqwest::Client::new()
        .get(format!("{base_url}/api/tags"))
        .timeout(Duration::from_secs(2))
        .send()
        .await
        .map(|r| r.status().is_success())
        .unwrap_or(false)
}

async fn has_model(base_url: &str, model: &str) -> bool {
    let Ok(resp) = reqwest::Client::new().get(format!("{base_url}/api/tags")).timeout(Duration::from_secs(5)).send().await else {
        return false;
    };
    let Ok(body) = resp.json::<serde_json::Value>().await else {
        return false;
    };
    let prefix = model.split(':').next().unwrap_or(model);
    body.get("models")
        .and_then(serde_json::Value::as_array)
        .map(|models| {
            models
                .iter()
                .filter_map(|m| m.get("name").and_then(serde_json::Value::as_str))
                .any(|name| name.starts_with(prefix))
        })
        .unwrap_or(false)
}

async fn install() -> bool {
    display::info("Installing Ollama...");
    let status = match std::env::consts::OS {
        "windows" => {
            tokio::time::timeout(
                INSTALL_TIMEOUT,
                Command::new("winget")
                    .args(["install", "Ollama.Ollama", "--silent", "--accept-package-agreements", "--accept-source-agreements"])
                    .status(),
            )
            .await
        }
        "macos" => tokio::time::timeout(INSTALL_TIMEOUT, Command::new("brew").args(["install", "ollama"]).status()).await,
        _ => {
            tokio::time::timeout(
                INSTALL_TIMEOUT,
                Command::new("sh").args(["-c", "curl -fsSL https://ollama.com/install.sh | sh"]).status(),
            )
            .await
        }
    };

    match status {
        Ok(Ok(s)) if s.success() => true,
        _ => is_installed().await,
    }
}

async fn start_server(base_url: &str) -> bool {
    if is_running(base_url).await {
        return true;
    }
    let spawned = Command::new("ollama").arg("serve").stdout(Stdio::null()).stderr(Stdio::null()).stdin(Stdio::null()).spawn();
    if spawned.is_err() {
        return false;
    }
    for _ in 0..POLL_ATTEMPTS {
        sleep(POLL_INTERVAL).await;
        if is_running(base_url).await {
            return true;
        }
    }
    false
}

async fn pull_model(model: &str) -> bool {
    display::info(&format!("Downloading model '{model}' (this may take a few minutes)..."));
    match tokio::time::timeout(PULL_TIMEOUT, Command::new("ollama").args(["pull", model]).status()).await {
        Ok(Ok(status)) => status.success(),
        _ => false,
    }
}

pub async fn execute(config: &mut AppConfig) -> anyhow::Result<()> {
    let model = config.ollama_model.clone();

    if !is_installed().await {
        if !install().await {
            display::error("Could not install Ollama automatically.");
            display::info("Install manually from: https://ollama.com/download");
            return Ok(());
        }
        display::success("Ollama installed.");
    }

    if !start_server(&config.ollama_url).await {
        display::error("Could not start the Ollama server.");
        return Ok(());
    }

    if !has_model(&config.ollama_url, &model).await {
        if !pull_model(&model).await {
            display::error(&format!("Could not download model '{model}'."));
            return Ok(());
        }
        display::success(&format!("Model '{model}' ready."));
    }

    config.nl_parser_enabled = true;
    config.save()?;
    aion_core::config::reload_config();
    display::success("Smart command understanding enabled.");
    Ok(())
}
