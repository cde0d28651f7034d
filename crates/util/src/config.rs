//! Client configuration for delivering submissions.
//!
//! Settings are read from a JSON file (`~/.config/formset/config.json` on most platforms, or
//! the path in `FORMSET_CONFIG_PATH`) and then overridden by environment variables:
//!
//! - `FORMSET_ENDPOINT`: URL submissions are sent to
//! - `FORMSET_CSRF_TOKEN`: value of the `X-CSRFToken` header
//! - `FORMSET_TIMEOUT_SECS`: request timeout in seconds

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::expand_tilde;

/// Environment variable allowing callers to override the config file path.
pub const CONFIG_PATH_ENV: &str = "FORMSET_CONFIG_PATH";
pub const ENDPOINT_ENV: &str = "FORMSET_ENDPOINT";
pub const CSRF_TOKEN_ENV: &str = "FORMSET_CSRF_TOKEN";
pub const TIMEOUT_ENV: &str = "FORMSET_TIMEOUT_SECS";

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ClientConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: Option<String>,
    pub csrf_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            csrf_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Loads the config file at the default location and applies environment overrides.
    pub fn load() -> Result<Self, ClientConfigError> {
        Self::load_from(&default_config_path())
    }

    /// Loads the config file at `path` and applies environment overrides. A missing file
    /// yields defaults; a malformed one is logged and ignored.
    pub fn load_from(path: &Path) -> Result<Self, ClientConfigError> {
        let mut config = read_config_file(path)?;
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(endpoint) = non_empty_env(ENDPOINT_ENV) {
            self.endpoint = Some(endpoint);
        }
        if let Some(token) = non_empty_env(CSRF_TOKEN_ENV) {
            self.csrf_token = Some(token);
        }
        if let Some(timeout) = non_empty_env(TIMEOUT_ENV) {
            match timeout.parse::<u64>() {
                Ok(seconds) if seconds > 0 => self.timeout_secs = seconds,
                _ => warn!(value = %timeout, "Ignoring invalid {TIMEOUT_ENV}"),
            }
        }
    }

    /// The configured endpoint, parsed. `None` when no endpoint is configured.
    pub fn endpoint_url(&self) -> Result<Option<Url>, ClientConfigError> {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return Ok(None);
        };
        Url::parse(endpoint).map(Some).map_err(|source| ClientConfigError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub fn default_config_path() -> PathBuf {
    if let Some(path) = non_empty_env(CONFIG_PATH_ENV) {
        return expand_tilde(&path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("formset")
        .join(CONFIG_FILE_NAME)
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_config_file(path: &Path) -> Result<ClientConfig, ClientConfigError> {
    match fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(config) => Ok(config),
            Err(error) => {
                warn!(
                    path = %path.display(),
                    error = %error,
                    "Failed to parse client config; using defaults"
                );
                Ok(ClientConfig::default())
            }
        },
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No client config file");
            Ok(ClientConfig::default())
        }
        Err(error) => Err(ClientConfigError::Io(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_OVERRIDES: [(&str, Option<&str>); 3] = [(ENDPOINT_ENV, None), (CSRF_TOKEN_ENV, None), (TIMEOUT_ENV, None)];

    #[test]
    fn missing_file_yields_defaults() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let config = temp_env::with_vars(NO_OVERRIDES, || ClientConfig::load_from(&temp_dir.path().join("absent.json"))).expect("load");
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn file_values_are_read_and_env_overrides_win() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{"endpoint": "http://localhost:8000/form/", "csrf_token": "file-token", "timeout_secs": 5}"#).expect("write config");

        let from_file = temp_env::with_vars(NO_OVERRIDES, || ClientConfig::load_from(&path)).expect("load");
        assert_eq!(from_file.csrf_token.as_deref(), Some("file-token"));
        assert_eq!(from_file.timeout_secs, 5);

        let overridden = temp_env::with_vars(
            [
                (ENDPOINT_ENV, Some("http://127.0.0.1:9000/submit/")),
                (CSRF_TOKEN_ENV, Some("env-token")),
                (TIMEOUT_ENV, Some("12")),
            ],
            || ClientConfig::load_from(&path),
        )
        .expect("load");
        assert_eq!(overridden.endpoint.as_deref(), Some("http://127.0.0.1:9000/submit/"));
        assert_eq!(overridden.csrf_token.as_deref(), Some("env-token"));
        assert_eq!(overridden.timeout_secs, 12);
    }

    #[test]
    fn malformed_file_and_bad_timeout_fall_back() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ not json").expect("write config");

        let config = temp_env::with_vars(
            [(ENDPOINT_ENV, None), (CSRF_TOKEN_ENV, None), (TIMEOUT_ENV, Some("soon"))],
            || ClientConfig::load_from(&path),
        )
        .expect("load");
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn config_path_env_is_honoured() {
        let path = temp_env::with_var(CONFIG_PATH_ENV, Some("/tmp/formset-test/config.json"), default_config_path);
        assert_eq!(path, PathBuf::from("/tmp/formset-test/config.json"));
    }

    #[test]
    fn endpoint_must_be_a_url() {
        let config = ClientConfig {
            endpoint: Some("not a url".into()),
            ..ClientConfig::default()
        };
        assert!(matches!(config.endpoint_url(), Err(ClientConfigError::InvalidEndpoint { .. })));
        assert_eq!(ClientConfig::default().endpoint_url().expect("no endpoint"), None);
    }
}
