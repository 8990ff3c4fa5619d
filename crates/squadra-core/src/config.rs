//! Application configuration management.
//!
//! Configuration is stored at `~/.config/squadra/config.json` and can be
//! overridden from the environment (`SQUADRA_*` variables, typically from a
//! `.env` file loaded by the binary).

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "squadra";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default local store file name
pub const DEFAULT_DATABASE_NAME: &str = "squadra.db";

const ENV_SUPABASE_URL: &str = "SQUADRA_SUPABASE_URL";
const ENV_SUPABASE_ANON_KEY: &str = "SQUADRA_SUPABASE_ANON_KEY";
const ENV_PERSIST_SESSION: &str = "SQUADRA_PERSIST_SESSION";
const ENV_AUTO_REFRESH_TOKEN: &str = "SQUADRA_AUTO_REFRESH_TOKEN";
const ENV_DATA_DIR: &str = "SQUADRA_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub persist_session: bool,
    /// Renew the access token from the stored refresh token when it is
    /// about to expire.
    pub auto_refresh_token: bool,
    pub database_name: String,
    pub data_dir: Option<PathBuf>,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            persist_session: true,
            auto_refresh_token: true,
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            data_dir: None,
            last_email: None,
        }
    }
}

/// Parse a boolean setting. Only the exact strings `true` and `false`
/// are recognized; anything else yields `default`.
pub fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value {
        Some("true") => true,
        Some("false") => false,
        _ => default,
    }
}

/// Parse a string setting, treating absent or empty as `default`.
pub fn parse_string(value: Option<&str>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Overlay settings from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        self.supabase_url = parse_string(var(ENV_SUPABASE_URL).as_deref(), &self.supabase_url);
        self.supabase_anon_key =
            parse_string(var(ENV_SUPABASE_ANON_KEY).as_deref(), &self.supabase_anon_key);
        self.persist_session =
            parse_bool(var(ENV_PERSIST_SESSION).as_deref(), self.persist_session);
        self.auto_refresh_token =
            parse_bool(var(ENV_AUTO_REFRESH_TOKEN).as_deref(), self.auto_refresh_token);
        if let Some(dir) = var(ENV_DATA_DIR).filter(|d| !d.is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    /// Directory holding the local store and the persisted session.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn is_backend_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }
}
