//! Logging configuration.
//!
//! Sources, lowest precedence first:
//! - `[log]` table of the writer config file
//! - Environment (`TSW_LOG`, then `RUST_LOG`, and `TSW_LOG_FORMAT`)
//! - CLI flags (`--log-level`, `--log-format`)

use serde::{Deserialize, Serialize};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Console lines for people.
    #[default]
    Human,
    /// One JSON object per line on stderr.
    Jsonl,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "text" | "pretty" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            _ => Err(format!("unknown log format: {s}")),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LogFormat::Human => "human",
            LogFormat::Jsonl => "jsonl",
        })
    }
}

/// Minimum level that reaches the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    /// Push lifecycle and retry notices.
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" | "none" => Ok(LogLevel::Off),
            _ => Err(format!("unknown log level: {s}")),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        })
    }
}

impl From<LogLevel> for tracing_subscriber::filter::LevelFilter {
    fn from(level: LogLevel) -> Self {
        use tracing_subscriber::filter::LevelFilter;
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

/// Settings as they appear in the `[log]` table of a config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    pub level: Option<LogLevel>,
    pub format: Option<LogFormat>,
    pub timestamps: Option<bool>,
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Prefix human lines with a timestamp.
    pub timestamps: bool,
    /// Include file and line in human output.
    pub source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Info,
            timestamps: true,
            source_location: false,
        }
    }
}

impl LogConfig {
    /// Build from the process environment with CLI overrides on top.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        LogConfig::default()
            .with_env(|key| std::env::var(key).ok())
            .with_overrides(cli_level, cli_format)
    }

    /// Apply file settings.
    pub fn with_settings(mut self, settings: &LogSettings) -> Self {
        if let Some(level) = settings.level {
            self.level = level;
        }
        if let Some(format) = settings.format {
            self.format = format;
        }
        if let Some(timestamps) = settings.timestamps {
            self.timestamps = timestamps;
        }
        self
    }

    /// Apply environment variables read through `lookup`.
    ///
    /// `TSW_LOG` wins over `RUST_LOG`. For `RUST_LOG` only the most verbose
    /// level word found anywhere in the directive string is honored.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("TSW_LOG") {
            if let Ok(level) = val.parse::<LogLevel>() {
                self.level = level;
            }
        } else if let Some(val) = lookup("RUST_LOG") {
            let val = val.to_ascii_lowercase();
            for (word, level) in [
                ("trace", LogLevel::Trace),
                ("debug", LogLevel::Debug),
                ("info", LogLevel::Info),
                ("warn", LogLevel::Warn),
                ("error", LogLevel::Error),
            ] {
                if val.contains(word) {
                    self.level = level;
                    break;
                }
            }
        }

        if let Some(val) = lookup("TSW_LOG_FORMAT") {
            if let Ok(format) = val.parse::<LogFormat>() {
                self.format = format;
            }
        }
        self
    }

    pub fn with_overrides(mut self, level: Option<LogLevel>, format: Option<LogFormat>) -> Self {
        if let Some(level) = level {
            self.level = level;
        }
        if let Some(format) = format {
            self.format = format;
        }
        self
    }

    /// Directive used when `RUST_LOG` does not provide a full filter.
    pub fn default_directive(&self) -> String {
        format!("tsw_core={0},tsw_convert={0}", self.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_format_aliases() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Jsonl);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_parse_level_aliases() {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(" none ".parse::<LogLevel>().unwrap(), LogLevel::Off);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_tsw_log_beats_rust_log() {
        let cfg = LogConfig::default().with_env(env(&[("TSW_LOG", "error"), ("RUST_LOG", "trace")]));
        assert_eq!(cfg.level, LogLevel::Error);
    }

    #[test]
    fn test_rust_log_directive_scan() {
        let cfg = LogConfig::default().with_env(env(&[("RUST_LOG", "tsw_core=debug,hyper=warn")]));
        assert_eq!(cfg.level, LogLevel::Debug);
    }

    #[test]
    fn test_format_from_env() {
        let cfg = LogConfig::default().with_env(env(&[("TSW_LOG_FORMAT", "jsonl")]));
        assert_eq!(cfg.format, LogFormat::Jsonl);
        assert_eq!(cfg.level, LogLevel::Info);
    }

    #[test]
    fn test_precedence_file_env_cli() {
        let settings = LogSettings {
            level: Some(LogLevel::Warn),
            format: Some(LogFormat::Jsonl),
            timestamps: Some(false),
        };
        let cfg = LogConfig::default()
            .with_settings(&settings)
            .with_env(env(&[("TSW_LOG", "debug")]))
            .with_overrides(None, Some(LogFormat::Human));
        assert_eq!(cfg.level, LogLevel::Debug);
        assert_eq!(cfg.format, LogFormat::Human);
        assert!(!cfg.timestamps);
    }

    #[test]
    fn test_default_directive() {
        let cfg = LogConfig::default().with_overrides(Some(LogLevel::Trace), None);
        assert_eq!(cfg.default_directive(), "tsw_core=trace,tsw_convert=trace");
    }
}
