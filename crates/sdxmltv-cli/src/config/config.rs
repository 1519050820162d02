//! `AppConfig` struct and TOML read/write.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use sdxmltv_api::schedules_direct::DEFAULT_BASE_URL;
use sdxmltv_guide::{ChannelMapping, GuideSettings};
use serde::{Deserialize, Serialize};
use url::Url;

/// Environment variable overriding `provider.username`.
const ENV_USERNAME: &str = "SD_USERNAME";
/// Environment variable overriding `provider.password`.
const ENV_PASSWORD: &str = "SD_PASSWORD";
/// Environment variable overriding `epg.days`.
const ENV_DAYS: &str = "EPG_DAYS";
/// Environment variable overriding `epg.cache_hours`.
const ENV_CACHE_HOURS: &str = "CACHE_HOURS";

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory holding the guide cache, token and snapshots.
    /// Relative paths are resolved against the config file's directory.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Schedules Direct account and transport settings.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Guide settings.
    #[serde(default)]
    pub epg: EpgConfig,
    /// Static channel map, in file order.
    #[serde(default)]
    pub channels: Vec<ChannelMapping>,
}

/// Schedules Direct account and transport settings.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Account user name.
    pub username: String,
    /// Account password, sent as-is to `/token`.
    pub password: String,
    /// API base URL.
    pub base_url: String,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum chunk requests in flight.
    pub concurrency: usize,
}

/// Guide settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EpgConfig {
    /// Postal code used to find a broadcast lineup.
    pub postal_code: String,
    /// ISO country code.
    pub country: String,
    /// Number of days of schedules.
    pub days: u32,
    /// Cache freshness window in hours.
    pub cache_hours: u64,
    /// Base URL for program artwork.
    pub artwork_base_url: String,
    /// Write `sd_*.json` snapshots next to the cache.
    pub write_snapshots: bool,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

/// Parses an integer override that must be greater than zero.
fn parse_positive(key: &str, raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => bail!("{key} must be a positive integer: {raw}"),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            provider: ProviderConfig::default(),
            epg: EpgConfig::default(),
            channels: Vec::new(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            base_url: String::from(DEFAULT_BASE_URL.trim_end_matches('/')),
            user_agent: String::from(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            )),
            timeout_secs: 60,
            concurrency: 4,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("user_agent", &self.user_agent)
            .field("timeout_secs", &self.timeout_secs)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl Default for EpgConfig {
    fn default() -> Self {
        Self {
            postal_code: String::new(),
            country: String::from("USA"),
            days: 7,
            cache_hours: 6,
            artwork_base_url: String::from(DEFAULT_BASE_URL.trim_end_matches('/')),
            write_snapshots: true,
        }
    }
}

impl ProviderConfig {
    /// Parsed API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL.
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .with_context(|| format!("invalid provider.base_url: {}", self.base_url))
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Saves config to a TOML file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation or file write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config to TOML")?;
        std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Applies `SD_USERNAME`, `SD_PASSWORD`, `EPG_DAYS` and `CACHE_HOURS`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric override does not parse.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`; empty values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(username) = get(ENV_USERNAME) {
            self.provider.username = username;
        }
        if let Some(password) = get(ENV_PASSWORD) {
            self.provider.password = password;
        }
        if let Some(days) = get(ENV_DAYS) {
            self.epg.days = u32::try_from(parse_positive(ENV_DAYS, &days)?)
                .with_context(|| format!("{ENV_DAYS} is out of range: {days}"))?;
        }
        if let Some(hours) = get(ENV_CACHE_HOURS) {
            self.epg.cache_hours = parse_positive(ENV_CACHE_HOURS, &hours)?;
        }
        Ok(())
    }

    /// Checks the settings a guide build needs.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing or invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.provider.username.is_empty() || self.provider.password.is_empty() {
            bail!("provider credentials are required (provider.username / provider.password)");
        }
        if self.epg.postal_code.trim().is_empty() {
            bail!("epg.postal_code is required");
        }
        if self.epg.days == 0 {
            bail!("epg.days must be at least 1");
        }
        if self.epg.cache_hours == 0 {
            bail!("epg.cache_hours must be at least 1");
        }
        if self.provider.timeout_secs == 0 {
            bail!("provider.timeout_secs must be at least 1");
        }
        if self.provider.concurrency == 0 {
            bail!("provider.concurrency must be at least 1");
        }
        self.provider.base_url()?;
        Ok(())
    }

    /// Cache directory, resolved against the directory of `config_path`.
    #[must_use]
    pub fn resolve_cache_dir(&self, config_path: &Path) -> PathBuf {
        if self.cache_dir.is_absolute() {
            return self.cache_dir.clone();
        }
        config_path
            .parent()
            .map_or_else(|| self.cache_dir.clone(), |p| p.join(&self.cache_dir))
    }

    /// Pipeline inputs derived from this config.
    #[must_use]
    pub fn guide_settings(&self) -> GuideSettings {
        GuideSettings {
            postal_code: String::from(self.epg.postal_code.trim()),
            country: self.epg.country.clone(),
            days: self.epg.days,
            artwork_base_url: self.epg.artwork_base_url.clone(),
            concurrency: self.provider.concurrency,
            channels: self.channels.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::HashMap;

    use super::*;

    const SAMPLE: &str = r#"
cache_dir = "./cache"

[provider]
username = "viewer"
password = "s3cret"

[epg]
postal_code = "72201"
days = 3

[[channels]]
number = "2.1"
station_id = "98078"
name = "KETS-1"

[[channels]]
number = "4.1"
station_id = "44775"
name = "KARK"
"#;

    fn sample() -> AppConfig {
        toml::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_default_config() {
        // Arrange & Act
        let config = AppConfig::default();

        // Assert
        assert_eq!(config.cache_dir, PathBuf::from("cache"));
        assert_eq!(
            config.provider.base_url,
            "https://json.schedulesdirect.org/20141201"
        );
        assert_eq!(config.provider.timeout_secs, 60);
        assert_eq!(config.provider.concurrency, 4);
        assert_eq!(config.epg.country, "USA");
        assert_eq!(config.epg.days, 7);
        assert_eq!(config.epg.cache_hours, 6);
        assert!(config.epg.write_snapshots);
        assert!(config.channels.is_empty());
    }

    #[test]
    fn test_parse_keeps_channel_order_and_fills_defaults() {
        // Arrange & Act
        let config = sample();

        // Assert
        assert_eq!(config.provider.username, "viewer");
        assert_eq!(config.provider.concurrency, 4);
        assert_eq!(config.epg.days, 3);
        assert_eq!(config.epg.cache_hours, 6);
        let ids: Vec<&str> = config
            .channels
            .iter()
            .map(|c| c.station_id.as_str())
            .collect();
        assert_eq!(ids, ["98078", "44775"]);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        // Arrange
        let config = sample();

        // Act
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        // Assert
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        // Act
        let config = AppConfig::load(&path).unwrap();

        // Assert
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = sample();

        // Act
        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();

        // Assert
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_empty_file() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        // Act
        let config = AppConfig::load(&path).unwrap();

        // Assert
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[epg\ndays = ").unwrap();

        // Act
        let result = AppConfig::load(&path);

        // Assert
        assert!(result.unwrap_err().to_string().contains("failed to parse"));
    }

    #[test]
    fn test_debug_redacts_password() {
        // Arrange
        let config = sample();

        // Act
        let debug = format!("{:?}", config.provider);

        // Assert
        assert!(debug.contains("viewer"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn test_overrides_replace_file_values() {
        // Arrange
        let mut config = sample();
        let env = HashMap::from([
            ("SD_USERNAME", "env-user"),
            ("SD_PASSWORD", "env-pass"),
            ("EPG_DAYS", "14"),
            ("CACHE_HOURS", " 12 "),
        ]);

        // Act
        config
            .apply_overrides(|k| env.get(k).map(|v| String::from(*v)))
            .unwrap();

        // Assert
        assert_eq!(config.provider.username, "env-user");
        assert_eq!(config.provider.password, "env-pass");
        assert_eq!(config.epg.days, 14);
        assert_eq!(config.epg.cache_hours, 12);
    }

    #[test]
    fn test_empty_override_is_ignored() {
        // Arrange
        let mut config = sample();

        // Act
        config
            .apply_overrides(|k| (k == "SD_USERNAME").then(String::new))
            .unwrap();

        // Assert
        assert_eq!(config.provider.username, "viewer");
    }

    #[test]
    fn test_non_numeric_days_override_fails() {
        // Arrange
        let mut config = sample();

        // Act
        let result = config.apply_overrides(|k| (k == "EPG_DAYS").then(|| String::from("week")));

        // Assert
        assert!(result.unwrap_err().to_string().contains("EPG_DAYS"));
    }

    #[test]
    fn test_validate() {
        // Arrange
        let ok = sample();
        let mut no_credentials = sample();
        no_credentials.provider.password.clear();
        let mut no_postal = sample();
        no_postal.epg.postal_code = String::from("  ");
        let mut zero_days = sample();
        zero_days.epg.days = 0;
        let mut bad_url = sample();
        bad_url.provider.base_url = String::from("not a url");
        let mut zero_hours = sample();
        zero_hours.epg.cache_hours = 0;
        let mut zero_timeout = sample();
        zero_timeout.provider.timeout_secs = 0;
        let mut zero_concurrency = sample();
        zero_concurrency.provider.concurrency = 0;

        // Act & Assert
        assert!(ok.validate().is_ok());
        assert!(
            no_credentials
                .validate()
                .unwrap_err()
                .to_string()
                .contains("credentials")
        );
        assert!(
            no_postal
                .validate()
                .unwrap_err()
                .to_string()
                .contains("postal_code")
        );
        assert!(zero_days.validate().is_err());
        assert!(bad_url.validate().is_err());
        assert!(
            zero_hours
                .validate()
                .unwrap_err()
                .to_string()
                .contains("epg.cache_hours")
        );
        assert!(
            zero_timeout
                .validate()
                .unwrap_err()
                .to_string()
                .contains("provider.timeout_secs")
        );
        assert!(
            zero_concurrency
                .validate()
                .unwrap_err()
                .to_string()
                .contains("provider.concurrency")
        );
    }

    #[test]
    fn test_zero_overrides_are_rejected() {
        // Arrange
        let mut config = sample();

        // Act
        let days = config.apply_overrides(|k| (k == "EPG_DAYS").then(|| String::from("0")));
        let hours = config.apply_overrides(|k| (k == "CACHE_HOURS").then(|| String::from(" 0 ")));

        // Assert
        assert!(
            days.unwrap_err()
                .to_string()
                .contains("EPG_DAYS must be a positive integer")
        );
        assert!(
            hours
                .unwrap_err()
                .to_string()
                .contains("CACHE_HOURS must be a positive integer")
        );
        assert_eq!(config.epg.days, 3);
        assert_eq!(config.epg.cache_hours, 6);
    }

    #[test]
    fn test_days_override_out_of_range_fails() {
        // Arrange
        let mut config = sample();

        // Act
        let result =
            config.apply_overrides(|k| (k == "EPG_DAYS").then(|| String::from("4294967296")));

        // Assert
        assert!(result.unwrap_err().to_string().contains("out of range"));
    }

    #[test]
    fn test_resolve_cache_dir() {
        // Arrange
        let mut config = sample();
        let config_path = Path::new("/srv/epg/config.toml");

        // Act
        let relative = config.resolve_cache_dir(config_path);
        config.cache_dir = PathBuf::from("/var/cache/sdxmltv");
        let absolute = config.resolve_cache_dir(config_path);

        // Assert
        assert_eq!(relative, PathBuf::from("/srv/epg/./cache"));
        assert_eq!(absolute, PathBuf::from("/var/cache/sdxmltv"));
    }

    #[test]
    fn test_guide_settings() {
        // Arrange
        let config = sample();

        // Act
        let settings = config.guide_settings();

        // Assert
        assert_eq!(settings.postal_code, "72201");
        assert_eq!(settings.country, "USA");
        assert_eq!(settings.days, 3);
        assert_eq!(settings.concurrency, 4);
        assert_eq!(
            settings.artwork_base_url,
            "https://json.schedulesdirect.org/20141201"
        );
        assert_eq!(settings.channels.len(), 2);
    }
}
