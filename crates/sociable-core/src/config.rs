//! Application configuration management.
//!
//! Holds the backend URL, request timeout, where tokens are kept, and the
//! last email used to log in.
//!
//! Configuration is stored at `~/.config/sociable/config.json`. The
//! `SOCIABLE_API_URL` environment variable overrides the configured URL.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::REQUEST_TIMEOUT_SECS;
use crate::auth::{FileTokenStore, KeyringTokenStore, Session, TokenStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "sociable";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend used when nothing is configured
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5559/api/";

/// Environment variable overriding `api_base_url`
pub const API_URL_ENV: &str = "SOCIABLE_API_URL";

/// Where the session tokens are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    /// `session.json` in the local data directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub token_backend: TokenBackend,
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for device-local state such as the session file.
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find local data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Effective backend URL: environment, then config file, then default.
    pub fn api_base_url(&self) -> String {
        Self::resolve_base_url(std::env::var(API_URL_ENV).ok(), self.api_base_url.as_deref())
    }

    fn resolve_base_url(env: Option<String>, configured: Option<&str>) -> String {
        env.filter(|url| !url.trim().is_empty())
            .or_else(|| configured.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(REQUEST_TIMEOUT_SECS)
    }

    pub fn token_store(&self) -> Result<Box<dyn TokenStore>> {
        Ok(match self.token_backend {
            TokenBackend::File => Box::new(FileTokenStore::new(Self::data_dir()?)),
            TokenBackend::Keyring => Box::new(KeyringTokenStore::new()),
        })
    }

    /// Session restored from the configured token store.
    pub fn open_session(&self) -> Result<Session> {
        Session::restore(self.token_store()?).context("Failed to restore session")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_base_url_precedence() {
        assert_eq!(Config::resolve_base_url(None, None), DEFAULT_API_BASE_URL);
        assert_eq!(
            Config::resolve_base_url(None, Some("https://social.example/api/")),
            "https://social.example/api/"
        );
        assert_eq!(
            Config::resolve_base_url(
                Some("http://10.0.2.2:5559/api/".into()),
                Some("https://social.example/api/")
            ),
            "http://10.0.2.2:5559/api/"
        );
        // Blank env var is ignored
        assert_eq!(
            Config::resolve_base_url(Some("  ".into()), Some("https://social.example/api/")),
            "https://social.example/api/"
        );
    }

    #[test]
    fn test_request_timeout_default() {
        let mut config = Config::default();
        assert_eq!(config.request_timeout_secs(), REQUEST_TIMEOUT_SECS);
        config.request_timeout_secs = Some(0);
        assert_eq!(config.request_timeout_secs(), REQUEST_TIMEOUT_SECS);
        config.request_timeout_secs = Some(5);
        assert_eq!(config.request_timeout_secs(), 5);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sociable").join(CONFIG_FILE);
        let config = Config {
            api_base_url: Some("https://social.example/api/".into()),
            request_timeout_secs: Some(10),
            token_backend: TokenBackend::Keyring,
            last_email: Some("linh@example.com".into()),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_base_url, config.api_base_url);
        assert_eq!(loaded.token_backend, TokenBackend::Keyring);
        assert_eq!(loaded.last_email.as_deref(), Some("linh@example.com"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.token_backend, TokenBackend::File);
        assert!(config.api_base_url.is_none());
    }

    #[test]
    fn test_token_backend_serializes_lowercase() {
        let json = serde_json::to_string(&TokenBackend::Keyring).unwrap();
        assert_eq!(json, r#""keyring""#);
    }
}
