//! Configuration management for wildalert.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "wildalert";

/// Default session file name.
const SESSION_FILE_NAME: &str = "session.json";

/// Address used in the feed URL when no identity is available yet.
pub const FALLBACK_EMAIL: &str = "default@example.com";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `WILDALERT_`)
/// 2. TOML config file at `~/.config/wildalert/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Live feed configuration.
    pub feed: FeedConfig,
    /// Alert configuration.
    pub alert: AlertConfig,
    /// Local capture device configuration.
    pub device: DeviceConfig,
    /// Session record configuration.
    pub session: SessionConfig,
}

/// Live-feed configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Base URL of the streaming backend; `/video_feed` is appended.
    pub base_url: String,
    /// Interval between automatic retries of a degraded feed.
    pub retry_interval_ms: u64,
    /// Address used when no identity is available.
    pub fallback_email: String,
    /// How long a probe may wait for the first bytes of the stream.
    pub probe_timeout_ms: u64,
}

/// Alert configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Base URL of the alert-ingestion service; `/send_alert` is appended.
    pub base_url: String,
    /// How long the "alert sent" notice stays visible.
    pub display_window_ms: u64,
    /// Timeout for a single alert request.
    pub request_timeout_ms: u64,
    /// Location reported when none is given on the command line.
    pub default_location: String,
}

/// Local capture device configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Path of the video device used by the local-capture variant.
    pub path: PathBuf,
}

/// Session record configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Path to the persisted session record.
    /// Defaults to `~/.local/share/wildalert/session.json`
    pub session_file: Option<PathBuf>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            retry_interval_ms: 5_000,
            fallback_email: FALLBACK_EMAIL.to_string(),
            probe_timeout_ms: 10_000,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            display_window_ms: 3_000,
            request_timeout_ms: 10_000,
            default_location: "Serengeti National Park".to_string(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/video0"),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("WILDALERT_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        check_base_url("feed.base_url", &self.feed.base_url)?;
        check_base_url("alert.base_url", &self.alert.base_url)?;

        for (name, value) in [
            ("feed.retry_interval_ms", self.feed.retry_interval_ms),
            ("feed.probe_timeout_ms", self.feed.probe_timeout_ms),
            ("alert.display_window_ms", self.alert.display_window_ms),
            ("alert.request_timeout_ms", self.alert.request_timeout_ms),
        ] {
            if value == 0 {
                return Err(Error::ConfigValidation {
                    message: format!("{name} must be greater than 0"),
                });
            }
        }

        if self.feed.fallback_email.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "feed.fallback_email cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Get the session file path, resolving defaults if not set.
    #[must_use]
    pub fn session_file(&self) -> PathBuf {
        self.session
            .session_file
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(SESSION_FILE_NAME))
    }

    /// Get the feed retry interval as a Duration.
    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.feed.retry_interval_ms)
    }

    /// Get the feed probe timeout as a Duration.
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.feed.probe_timeout_ms)
    }

    /// Get the alert display window as a Duration.
    #[must_use]
    pub fn display_window(&self) -> Duration {
        Duration::from_millis(self.alert.display_window_ms)
    }

    /// Get the alert request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.alert.request_timeout_ms)
    }
}

fn check_base_url(name: &str, value: &str) -> Result<()> {
    let url = Url::parse(value).map_err(|e| Error::ConfigValidation {
        message: format!("{name} is not a valid URL ({e}): {value}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::ConfigValidation {
            message: format!("{name} must use http or https: {value}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.feed.base_url, "http://localhost:5000");
        assert_eq!(config.feed.fallback_email, FALLBACK_EMAIL);
        assert_eq!(config.alert.display_window_ms, 3_000);
        assert_eq!(config.device.path, PathBuf::from("/dev/video0"));
        assert!(config.session.session_file.is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_retry_interval() {
        let mut config = Config::default();
        config.feed.retry_interval_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("retry_interval_ms"));
    }

    #[test]
    fn test_validate_zero_display_window() {
        let mut config = Config::default();
        config.alert.display_window_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("display_window_ms"));
    }

    #[test]
    fn test_validate_invalid_base_url() {
        let mut config = Config::default();
        config.feed.base_url = "localhost:5000/feed".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("feed.base_url"));
    }

    #[test]
    fn test_validate_relative_alert_url() {
        let mut config = Config::default();
        config.alert.base_url = "/api".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("alert.base_url"));
    }

    #[test]
    fn test_validate_empty_fallback_email() {
        let mut config = Config::default();
        config.feed.fallback_email = "  ".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("fallback_email"));
    }

    #[test]
    fn test_session_file_default() {
        let config = Config::default();
        assert!(config
            .session_file()
            .to_string_lossy()
            .contains("session.json"));
    }

    #[test]
    fn test_session_file_custom() {
        let mut config = Config::default();
        config.session.session_file = Some(PathBuf::from("/tmp/wa/session.json"));
        assert_eq!(config.session_file(), PathBuf::from("/tmp/wa/session.json"));
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.retry_interval(), Duration::from_secs(5));
        assert_eq!(config.display_window(), Duration::from_secs(3));
        assert_eq!(config.probe_timeout(), Duration::from_secs(10));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("wildalert"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[feed]\nbase_url = \"http://cams.local:8080\"\nretry_interval_ms = 2000\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.feed.base_url, "http://cams.local:8080");
        assert_eq!(config.retry_interval(), Duration::from_secs(2));
        assert_eq!(config.alert, AlertConfig::default());
    }

    #[test]
    fn test_load_from_toml_file_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[alert]\ndisplay_window_ms = 0\n").unwrap();

        let err = Config::load_from(Some(path)).unwrap_err();
        assert!(err.to_string().contains("display_window_ms"));
    }

    #[test]
    fn test_load_from_toml_file_all_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[alert]\ndefault_location = \"Masai Mara\"\n\n[device]\npath = \"/dev/video3\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.alert.default_location, "Masai Mara");
        assert_eq!(config.device.path, PathBuf::from("/dev/video3"));
        assert_eq!(config.feed, FeedConfig::default());
    }

    #[test]
    fn test_feed_config_deserialize() {
        let json = r#"{"retry_interval_ms": 1500}"#;
        let feed: FeedConfig = serde_json::from_str(json).unwrap();
        assert_eq!(feed.retry_interval_ms, 1500);
        assert_eq!(feed.fallback_email, FALLBACK_EMAIL);
    }
}
