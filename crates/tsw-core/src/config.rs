//! Writer configuration file.
//!
//! ```toml
//! [log]
//! level = "debug"
//! format = "jsonl"
//!
//! [defaults]
//! push_mode = "fast"
//! retries = 3
//! retry_delay = 500
//! ```
//!
//! `TSW_RETRIES` and `TSW_PUSH_MODE` override the file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tsw_common::{Error, Result};

use crate::batch::PushMode;
use crate::logging::LogSettings;
use crate::options::{PushOptions, Retries};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriterConfig {
    pub log: LogSettings,
    /// Options used when a push does not supply its own.
    pub defaults: PushOptions,
}

impl WriterConfig {
    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "loaded writer config");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: WriterConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides from the process environment.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("TSW_RETRIES") {
            let retries = val
                .trim()
                .parse::<u32>()
                .map_err(|_| Error::Config(format!("TSW_RETRIES must be an integer, got {val:?}")))?;
            self.defaults.retries = Retries::Count(retries);
        }
        if let Some(val) = lookup("TSW_PUSH_MODE") {
            self.defaults.push_mode = val
                .parse::<PushMode>()
                .map_err(|e| Error::Config(format!("TSW_PUSH_MODE: {e}")))?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.defaults
            .validate()
            .map_err(|e| Error::Config(format!("[defaults] {e}")))
    }
}
