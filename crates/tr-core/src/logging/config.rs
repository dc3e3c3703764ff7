//! Logging configuration.
//!
//! Supports configuration via:
//! - CLI flags (-v/-q, --log-format), highest priority
//! - Environment variables (TR_LOG, then RUST_LOG; TR_LOG_FORMAT)

use serde::{Deserialize, Serialize};

pub const ENV_LOG: &str = "TR_LOG";
pub const ENV_LOG_FORMAT: &str = "TR_LOG_FORMAT";

/// Crates whose events are enabled by the level filter.
const LOG_TARGETS: [&str; 4] = ["tr_core", "tr_bundle", "tr_telemetry", "tr_identity"];

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console format (default).
    #[default]
    Human,
    /// Machine-parseable JSON lines.
    Jsonl,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "console" | "pretty" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Human => write!(f, "human"),
            LogFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// Log level filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" | "none" | "quiet" => Ok(LogLevel::Off),
            _ => Err(format!("unknown log level: {}", s)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Off => write!(f, "off"),
        }
    }
}

impl LogLevel {
    /// Level implied by `-v` count and `-q`.
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Option<Self> {
        match (quiet, verbose) {
            (true, _) => Some(LogLevel::Error),
            (false, 0) => None,
            (false, 1) => Some(LogLevel::Debug),
            (false, _) => Some(LogLevel::Trace),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Raw `RUST_LOG` directives, used only when nothing more specific is set.
    pub directives: Option<String>,
    /// Whether to include timestamps in human output.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Info,
            directives: None,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Create config from the process environment and CLI overrides.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        Self::resolve(
            std::env::var(ENV_LOG).ok().as_deref(),
            std::env::var("RUST_LOG").ok().as_deref(),
            std::env::var(ENV_LOG_FORMAT).ok().as_deref(),
            cli_level,
            cli_format,
        )
    }

    /// Resolution with every source passed in explicitly.
    pub fn resolve(
        tr_log: Option<&str>,
        rust_log: Option<&str>,
        tr_log_format: Option<&str>,
        cli_level: Option<LogLevel>,
        cli_format: Option<LogFormat>,
    ) -> Self {
        let mut config = LogConfig::default();

        if let Some(level) = cli_level {
            config.level = level;
        } else if let Some(level) = tr_log.and_then(|v| v.parse::<LogLevel>().ok()) {
            config.level = level;
        } else if let Some(directives) = rust_log.filter(|v| !v.trim().is_empty()) {
            config.directives = Some(directives.to_string());
        }

        if let Some(format) = cli_format {
            config.format = format;
        } else if let Some(format) = tr_log_format.and_then(|v| v.parse::<LogFormat>().ok()) {
            config.format = format;
        }

        config
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self.directives = None;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    /// `EnvFilter` directive string for this config.
    pub fn filter_directives(&self) -> String {
        if let Some(directives) = &self.directives {
            return directives.clone();
        }
        LOG_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, self.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("human".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Jsonl);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("quiet".parse::<LogLevel>().unwrap(), LogLevel::Off);
        assert_eq!(" DEBUG ".parse::<LogLevel>().unwrap(), LogLevel::Debug);
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(LogLevel::from_verbosity(0, false), None);
        assert_eq!(LogLevel::from_verbosity(1, false), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_verbosity(3, false), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_verbosity(2, true), Some(LogLevel::Error));
    }

    #[test]
    fn test_cli_beats_env() {
        let config = LogConfig::resolve(
            Some("trace"),
            Some("debug"),
            Some("json"),
            Some(LogLevel::Warn),
            Some(LogFormat::Human),
        );
        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.format, LogFormat::Human);
        assert!(config.directives.is_none());
    }

    #[test]
    fn test_tr_log_beats_rust_log() {
        let config = LogConfig::resolve(Some("debug"), Some("hyper=trace"), None, None, None);
        assert_eq!(config.level, LogLevel::Debug);
        assert!(config.directives.is_none());
        assert!(config.filter_directives().contains("tr_core=debug"));
    }

    #[test]
    fn test_rust_log_passthrough() {
        let config = LogConfig::resolve(None, Some("reqwest=debug,tr_core=trace"), Some("jsonl"), None, None);
        assert_eq!(config.filter_directives(), "reqwest=debug,tr_core=trace");
        assert_eq!(config.format, LogFormat::Jsonl);
    }
}
