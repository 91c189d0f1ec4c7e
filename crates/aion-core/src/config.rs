//! Configuration and token persistence (C12), plus the process-wide caches
//! the rest of the crate reads through instead of hitting disk on every
//! call. The cache is a deliberate, narrowly-scoped exception to "pass a
//! context handle everywhere": it exists so `reload_config()` can mirror
//! the source's module-level reset hook.

use std::path::{Path, PathBuf};
use std::sync::{OnceLock, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{AionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Sqlite,
    Google,
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Sqlite
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub account_id: String,
    pub timezone: String,
    pub backend: Backend,
    pub sqlite_path: PathBuf,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub ollama_url: String,
    pub ollama_model: String,
    pub nl_parser_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            account_id: "default".to_string(),
            timezone: "UTC".to_string(),
            backend: Backend::Sqlite,
            sqlite_path: default_sqlite_path(),
            google_client_id: None,
            google_client_secret: None,
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "qwen2.5:0.5b".to_string(),
            nl_parser_enabled: true,
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    config_dir().join("aion.db")
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("aion")
}

fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

fn tokens_path() -> PathBuf {
    config_dir().join("tokens.json")
}

impl AppConfig {
    pub fn load() -> Result<AppConfig> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<AppConfig> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| AionError::Config(format!("reading {}: {e}", path.display())))?;
            toml::from_str(&raw)
                .map_err(|e| AionError::Config(format!("parsing {}: {e}", path.display())))?
        } else {
            AppConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("AION_TIMEZONE") {
            self.timezone = v;
        }
        if let Ok(v) = std::env::var("AION_BACKEND") {
            self.backend = match v.to_lowercase().as_str() {
                "google" => Backend::Google,
                _ => Backend::Sqlite,
            };
        }
        if let Ok(v) = std::env::var("AION_SQLITE_PATH") {
            self.sqlite_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("AION_GOOGLE_CLIENT_ID") {
            self.google_client_id = Some(v);
        }
        if let Ok(v) = std::env::var("AION_GOOGLE_CLIENT_SECRET") {
            self.google_client_secret = Some(v);
        }
        if let Ok(v) = std::env::var("AION_OLLAMA_URL") {
            self.ollama_url = v;
        }
        if let Ok(v) = std::env::var("AION_OLLAMA_MODEL") {
            self.ollama_model = v;
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let body = toml::to_string_pretty(self)
            .map_err(|e| AionError::Config(format!("serializing config: {e}")))?;
        write_atomic(path, body.as_bytes())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: String,
}

// Redact token values by hand rather than deriving Debug, so a log line
// that accidentally formats a TokenRecord can't leak a live credential.
impl std::fmt::Debug for RedactedToken<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.0.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.0.expires_in)
            .field("token_type", &self.0.token_type)
            .finish()
    }
}

pub struct RedactedToken<'a>(pub &'a TokenRecord);

pub struct TokenStore;

impl TokenStore {
    pub fn load() -> Result<Option<TokenRecord>> {
        Self::load_from(&tokens_path())
    }

    pub fn load_from(path: &Path) -> Result<Option<TokenRecord>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AionError::Config(format!("reading {}: {e}", path.display())))?;
        let record = serde_json::from_str(&raw)
            .map_err(|e| AionError::Config(format!("parsing {}: {e}", path.display())))?;
        Ok(Some(record))
    }

    pub fn save(record: &TokenRecord) -> Result<()> {
        Self::save_to(&tokens_path(), record)
    }

    pub fn save_to(path: &Path, record: &TokenRecord) -> Result<()> {
        let body = serde_json::to_string_pretty(record)
            .map_err(|e| AionError::Config(format!("serializing tokens: {e}")))?;
        write_atomic(path, body.as_bytes())?;
        restrict_permissions(path);
        Ok(())
    }

    pub fn clear() -> Result<()> {
        let path = tokens_path();
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| AionError::Config(format!("removing {}: {e}", path.display())))?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = std::fs::metadata(path) {
        let mut perms = metadata.permissions();
        perms.set_mode(0o600);
        let _ = std::fs::set_permissions(path, perms);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

fn write_atomic(path: &Path, body: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AionError::Config(format!("creating {}: {e}", parent.display())))?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, body).map_err(|e| AionError::Config(format!("writing {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path).map_err(|e| AionError::Config(format!("renaming {}: {e}", tmp.display())))?;
    Ok(())
}

static CONFIG_CACHE: OnceLock<RwLock<Option<AppConfig>>> = OnceLock::new();

/// The process-wide config cache. Populated lazily on first access.
pub fn cached_config() -> Result<AppConfig> {
    let cache = CONFIG_CACHE.get_or_init(|| RwLock::new(None));
    if let Some(config) = cache.read().unwrap().as_ref() {
        return Ok(config.clone());
    }
    let loaded = AppConfig::load()?;
    *cache.write().unwrap() = Some(loaded.clone());
    Ok(loaded)
}

/// Clear the cached config, forcing the next `cached_config()` call to
/// re-read from disk. Mirrors the source's `reload_config()`.
pub fn reload_config() {
    if let Some(cache) = CONFIG_CACHE.get() {
        *cache.write().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.account_id, "default");
        assert_eq!(config.backend, Backend::Sqlite);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = AppConfig::default();
        config.timezone = "America/New_York".to_string();
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.timezone, "America/New_York");
    }

    #[test]
    fn corrupt_file_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not valid toml {{{").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn env_override_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        AppConfig::default().save_to(&path).unwrap();
        std::env::set_var("AION_TIMEZONE", "Europe/Berlin");
        let loaded = AppConfig::load_from(&path).unwrap();
        std::env::remove_var("AION_TIMEZONE");
        assert_eq!(loaded.timezone, "Europe/Berlin");
    }
}
