//! Client configuration.
//!
//! `AppConfig` is resolved from built-in defaults, then an optional
//! `config.json` in the platform config directory, then `TIMELINE_*`
//! environment variables. Secrets here are service API keys only; user
//! tokens live in the credential store.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::CallbackTarget;
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_MAX_BATCH_BYTES: usize = 512 * 1024;
pub const DEFAULT_RESTORE_LIMIT: usize = 50;

const APP_DIR: &str = "timeline";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Missing configuration value '{0}'")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Notes service root, e.g. `https://notes.example.com`
    pub base_url: Option<String>,
    pub auth_api_key: Option<String>,
    pub sync_api_key: Option<String>,
    /// Page that starts the OAuth flow
    pub login_url: Option<String>,
    pub callback: CallbackTarget,
    /// Upper bound on one serialized sync request
    pub max_batch_bytes: usize,
    pub restore_limit: usize,
    /// Root for notes, media and the sync queue
    pub data_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            auth_api_key: None,
            sync_api_key: None,
            login_url: None,
            callback: CallbackTarget::default(),
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            restore_limit: DEFAULT_RESTORE_LIMIT,
            data_dir: None,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from the default file location and process env
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match default_config_path() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.normalize()
    }

    /// Read a JSON config file; a missing file yields defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Overlay `TIMELINE_*` variables provided by `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| normalize_text_option(lookup(key));

        if let Some(value) = text("TIMELINE_BASE_URL") {
            self.base_url = Some(value);
        }
        if let Some(value) = text("TIMELINE_AUTH_API_KEY") {
            self.auth_api_key = Some(value);
        }
        if let Some(value) = text("TIMELINE_SYNC_API_KEY") {
            self.sync_api_key = Some(value);
        }
        if let Some(value) = text("TIMELINE_LOGIN_URL") {
            self.login_url = Some(value);
        }
        if let Some(value) = text("TIMELINE_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = text("TIMELINE_MAX_BATCH_BYTES") {
            self.max_batch_bytes = value.parse().map_err(|_| {
                ConfigError::Invalid(format!("TIMELINE_MAX_BATCH_BYTES must be a byte count, got '{value}'"))
            })?;
        }
        Ok(())
    }

    /// Trim values, drop empties, and validate URLs and limits
    pub fn normalize(mut self) -> Result<Self, ConfigError> {
        self.base_url = normalize_url(self.base_url.take(), "base_url")?;
        self.login_url = normalize_url(self.login_url.take(), "login_url")?;
        self.auth_api_key = normalize_text_option(self.auth_api_key.take());
        self.sync_api_key = normalize_text_option(self.sync_api_key.take());

        self.callback.scheme = self.callback.scheme.trim().to_ascii_lowercase();
        self.callback.host = self.callback.host.trim().to_string();
        let path = self.callback.path.trim();
        self.callback.path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        if self.callback.scheme.is_empty() || self.callback.host.is_empty() {
            return Err(ConfigError::Invalid(
                "callback scheme and host must not be empty".to_string(),
            ));
        }

        if self.max_batch_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_batch_bytes must be greater than zero".to_string(),
            ));
        }
        if self.restore_limit == 0 {
            self.restore_limit = DEFAULT_RESTORE_LIMIT;
        }
        Ok(self)
    }

    pub fn require_base_url(&self) -> Result<&str, ConfigError> {
        self.base_url.as_deref().ok_or(ConfigError::Missing("base_url"))
    }

    pub fn require_auth_api_key(&self) -> Result<&str, ConfigError> {
        self.auth_api_key
            .as_deref()
            .ok_or(ConfigError::Missing("auth_api_key"))
    }

    pub fn require_sync_api_key(&self) -> Result<&str, ConfigError> {
        self.sync_api_key
            .as_deref()
            .ok_or(ConfigError::Missing("sync_api_key"))
    }

    /// Configured data directory, else the platform data dir
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
        })
    }

    pub fn notes_db_path(&self) -> PathBuf {
        self.data_dir().join("notes.db")
    }
}

/// `<config dir>/timeline/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

fn normalize_url(value: Option<String>, field: &str) -> Result<Option<String>, ConfigError> {
    let Some(value) = normalize_text_option(value) else {
        return Ok(None);
    };
    if !is_http_url(&value) {
        return Err(ConfigError::Invalid(format!(
            "{field} must include http:// or https://"
        )));
    }
    Ok(Some(value.trim_end_matches('/').to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default().normalize().unwrap();
        assert_eq!(config.max_batch_bytes, 512 * 1024);
        assert_eq!(config.restore_limit, 50);
        assert_eq!(config.callback, CallbackTarget::default());
        assert!(config.require_base_url().is_err());
    }

    #[test]
    fn file_then_env_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"base_url": "https://file.example.com/", "sync_api_key": "file-key", "restore_limit": 10}"#,
        )
        .unwrap();

        let mut config = AppConfig::from_file(&path).unwrap();
        config
            .apply_env(env(&[
                ("TIMELINE_BASE_URL", " https://env.example.com/ "),
                ("TIMELINE_AUTH_API_KEY", "   "),
                ("TIMELINE_MAX_BATCH_BYTES", "2048"),
                ("TIMELINE_DATA_DIR", "/tmp/timeline-data"),
            ]))
            .unwrap();
        let config = config.normalize().unwrap();

        assert_eq!(config.base_url.as_deref(), Some("https://env.example.com"));
        assert_eq!(config.sync_api_key.as_deref(), Some("file-key"));
        assert_eq!(config.auth_api_key, None);
        assert_eq!(config.max_batch_bytes, 2048);
        assert_eq!(config.restore_limit, 10);
        assert_eq!(
            config.notes_db_path(),
            PathBuf::from("/tmp/timeline-data/notes.db")
        );
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::from_file(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn rejects_unknown_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"base_url": "https://x.example", "surprise": 1}"#).unwrap();

        let error = AppConfig::from_file(&path).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn rejects_non_http_urls_and_bad_numbers() {
        let config = AppConfig {
            base_url: Some("ftp://notes.example.com".to_string()),
            ..AppConfig::default()
        };
        assert!(config.normalize().is_err());

        let mut config = AppConfig::default();
        assert!(config
            .apply_env(env(&[("TIMELINE_MAX_BATCH_BYTES", "lots")]))
            .is_err());
    }

    #[test]
    fn callback_path_gets_leading_slash() {
        let config = AppConfig {
            callback: CallbackTarget {
                scheme: " Timeline ".to_string(),
                host: "auth".to_string(),
                path: "callback".to_string(),
            },
            ..AppConfig::default()
        };
        let config = config.normalize().unwrap();
        assert_eq!(config.callback.scheme, "timeline");
        assert_eq!(config.callback.path, "/callback");
    }
}
