//! Upload configuration loading and validation.
//!
//! Resolution order (highest to lowest priority):
//! 1. Explicit CLI flags (via [`ConfigOptions`])
//! 2. Environment variables (`TR_ACCESS_TOKEN`, `TR_ENDPOINT`, `TR_OIDC_AUDIENCE`)
//! 3. Config file (`--config`, or `$XDG_CONFIG_HOME/testrelay/config.toml`)
//! 4. Built-in defaults
//!
//! # Example file
//!
//! ```toml
//! endpoint = "https://api.testrelay.dev"
//! oidc_audience = "testrelay"
//! backoff_ms = [100, 500, 1000]
//! throw_on_failure = false
//! brotli_quality = 9
//! request_timeout_secs = 60
//! ```

use crate::upload::{DEFAULT_BACKOFF_MS, DEFAULT_BROTLI_QUALITY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Default aggregation service endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.testrelay.dev";

/// Config directory name under the XDG config home.
const CONFIG_DIR_NAME: &str = "testrelay";
const CONFIG_FILE_NAME: &str = "config.toml";

pub const ENV_ACCESS_TOKEN: &str = "TR_ACCESS_TOKEN";
pub const ENV_ENDPOINT: &str = "TR_ENDPOINT";
pub const ENV_OIDC_AUDIENCE: &str = "TR_OIDC_AUDIENCE";

/// Largest single backoff delay accepted from configuration.
const MAX_BACKOFF_MS: u64 = 60_000;

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid TOML in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

impl From<ConfigError> for tr_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidEndpoint { .. } => tr_common::Error::InvalidEndpoint(err.to_string()),
            other => tr_common::Error::Config(other.to_string()),
        }
    }
}

/// Settings for the upload pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oidc_audience: Option<String>,
    pub backoff_ms: Vec<u64>,
    pub throw_on_failure: bool,
    pub brotli_quality: u32,
    pub request_timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_token: None,
            oidc_audience: None,
            backoff_ms: DEFAULT_BACKOFF_MS.to_vec(),
            throw_on_failure: false,
            brotli_quality: DEFAULT_BROTLI_QUALITY,
            request_timeout_secs: 60,
        }
    }
}

impl UploadConfig {
    /// Semantic validation after all layers are merged.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::InvalidEndpoint {
                endpoint: self.endpoint.clone(),
                reason: "endpoint is empty".to_string(),
            });
        }
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(ConfigError::InvalidEndpoint {
                endpoint: self.endpoint.clone(),
                reason: "scheme must be http or https".to_string(),
            });
        }
        if self.brotli_quality > 11 {
            return Err(ConfigError::InvalidValue {
                field: "brotli_quality",
                message: format!("{} is outside 0-11", self.brotli_quality),
            });
        }
        if let Some(delay) = self.backoff_ms.iter().find(|d| **d > MAX_BACKOFF_MS) {
            return Err(ConfigError::InvalidValue {
                field: "backoff_ms",
                message: format!("delay {delay}ms exceeds {MAX_BACKOFF_MS}ms"),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs",
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Config with the access token masked, for display.
    pub fn redacted(&self) -> Self {
        Self {
            access_token: self.access_token.as_ref().map(|_| "***".to_string()),
            ..self.clone()
        }
    }
}

/// Configuration resolution options (CLI layer).
#[derive(Debug, Default, Clone)]
pub struct ConfigOptions {
    /// Explicit config file. Must exist when given.
    pub config_path: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub access_token: Option<String>,
    pub oidc_audience: Option<String>,
    /// `Some(true)` forces strict mode.
    pub throw_on_failure: Option<bool>,
}

/// Values read from the process environment.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    pub endpoint: Option<String>,
    pub access_token: Option<String>,
    pub oidc_audience: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            endpoint: non_empty(ENV_ENDPOINT),
            access_token: non_empty(ENV_ACCESS_TOKEN),
            oidc_audience: non_empty(ENV_OIDC_AUDIENCE),
        }
    }
}

/// Load configuration with the standard resolution order.
pub fn load_config(options: &ConfigOptions) -> Result<UploadConfig, ConfigError> {
    resolve_config(options, &EnvOverrides::from_env(), default_config_path())
}

/// Resolution with the environment and default file location passed in.
pub fn resolve_config(
    options: &ConfigOptions,
    env: &EnvOverrides,
    default_path: Option<PathBuf>,
) -> Result<UploadConfig, ConfigError> {
    let mut config = match &options.config_path {
        Some(path) => load_file(path)?,
        None => match default_path {
            Some(path) if path.exists() => load_file(&path)?,
            _ => UploadConfig::default(),
        },
    };

    if let Some(endpoint) = &env.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(token) = &env.access_token {
        config.access_token = Some(token.clone());
    }
    if let Some(audience) = &env.oidc_audience {
        config.oidc_audience = Some(audience.clone());
    }

    if let Some(endpoint) = &options.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(token) = &options.access_token {
        config.access_token = Some(token.clone());
    }
    if let Some(audience) = &options.oidc_audience {
        config.oidc_audience = Some(audience.clone());
    }
    if let Some(strict) = options.throw_on_failure {
        config.throw_on_failure = strict;
    }

    config.validate()?;
    Ok(config)
}

/// `$XDG_CONFIG_HOME/testrelay/config.toml`, falling back to `~/.config`.
pub fn default_config_path() -> Option<PathBuf> {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .ok()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))?;
    Some(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn load_file(path: &Path) -> Result<UploadConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    let config: UploadConfig = toml::from_str(&content).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Loaded config file");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_when_nothing_configured() {
        let config = resolve_config(&ConfigOptions::default(), &EnvOverrides::default(), None).unwrap();
        assert_eq!(config, UploadConfig::default());
        assert_eq!(config.backoff_ms, vec![100, 500, 1000, 1000, 1000, 1000]);
    }

    #[test]
    fn test_file_then_env_then_cli() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "endpoint = \"https://file.example\"\naccess_token = \"file-token\"\nbackoff_ms = [5]\n",
        );

        let from_file = resolve_config(
            &ConfigOptions::default(),
            &EnvOverrides::default(),
            Some(path.clone()),
        )
        .unwrap();
        assert_eq!(from_file.endpoint, "https://file.example");
        assert_eq!(from_file.backoff_ms, vec![5]);

        let env = EnvOverrides {
            access_token: Some("env-token".into()),
            ..Default::default()
        };
        let with_env = resolve_config(&ConfigOptions::default(), &env, Some(path.clone())).unwrap();
        assert_eq!(with_env.access_token.as_deref(), Some("env-token"));
        assert_eq!(with_env.endpoint, "https://file.example");

        let cli = ConfigOptions {
            access_token: Some("cli-token".into()),
            endpoint: Some("http://localhost:9000".into()),
            throw_on_failure: Some(true),
            ..Default::default()
        };
        let with_cli = resolve_config(&cli, &env, Some(path)).unwrap();
        assert_eq!(with_cli.access_token.as_deref(), Some("cli-token"));
        assert_eq!(with_cli.endpoint, "http://localhost:9000");
        assert!(with_cli.throw_on_failure);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let options = ConfigOptions {
            config_path: Some(PathBuf::from("/nonexistent/testrelay.toml")),
            ..Default::default()
        };
        let err = resolve_config(&options, &EnvOverrides::default(), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "endpoint = [unterminated");
        let err = resolve_config(&ConfigOptions::default(), &EnvOverrides::default(), Some(path))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_endpoint_validation() {
        for bad in ["", "   ", "ftp://files.example", "api.testrelay.dev"] {
            let config = UploadConfig {
                endpoint: bad.to_string(),
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidEndpoint { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_quality_bound() {
        let config = UploadConfig {
            brotli_quality: 12,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "brotli_quality", .. })
        ));
    }

    #[test]
    fn test_redacted_hides_token() {
        let config = UploadConfig {
            access_token: Some("secret".into()),
            ..Default::default()
        };
        assert_eq!(config.redacted().access_token.as_deref(), Some("***"));
    }
}
