//! On-disk configuration.
//!
//! The aggregator shares a small JSON file with the rest of the tooling,
//! by default `~/.radconfig.json`:
//!
//! ```json
//! { "db_url": "postgres://localhost:5432/radgregator", "current_user_name": "lori" }
//! ```
//!
//! A database URL given on the command line (or via `DATABASE_URL`) takes
//! precedence over `db_url`.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

pub const CONFIG_FILE_NAME: &str = ".radconfig.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub db_url: Option<String>,
    /// Set by the login command; only reported here.
    #[serde(default)]
    pub current_user_name: Option<String>,
}

impl Config {
    /// `$HOME/.radconfig.json`, if a home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(CONFIG_FILE_NAME))
    }

    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let config = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        debug!("Loaded config file");
        Ok(config)
    }

    /// Load an explicitly requested file, or fall back to the default location.
    ///
    /// An explicit path must exist; a missing default file yields an empty config.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// The database URL to connect with; `override_url` wins over the file.
    pub fn database_url(&self, override_url: Option<&str>) -> Result<String, ConfigError> {
        let usable = |url: &str| {
            let url = url.trim();
            (!url.is_empty()).then(|| url.to_string())
        };

        override_url
            .and_then(usable)
            .or_else(|| self.db_url.as_deref().and_then(usable))
            .ok_or(ConfigError::MissingDatabaseUrl)
    }
}
