//! Configuration management for stanzatap.
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

use crate::configure::TapOptions;
use crate::error::{Error, Result};
use crate::locator::LocatorConfig;
use crate::logging::LogLevel;
use crate::pattern::PatternSpec;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "stanzatap";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "settings.db";

/// Prefix for environment overrides.
const ENV_PREFIX: &str = "STANZATAP_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `STANZATAP_`, sections split on `__`)
/// 2. TOML config file at `~/.config/stanzatap/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tap settings.
    pub tap: TapConfig,
    /// Instance discovery settings.
    pub discovery: DiscoveryConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
}

/// Settings fed to the configurator at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapConfig {
    /// Log filter regex. When unset the persisted filter is kept.
    pub log_filter: Option<String>,
    /// Stanza log level name.
    pub level: String,
    /// Print wall-clock timestamps instead of deltas.
    pub absolute_time: bool,
    /// Drop filter regex for outbound stanzas. When unset everything is sent.
    pub filter_realtime: Option<String>,
    /// Install the built-in address and credential rewriting rules.
    pub thaw_ice: bool,
    /// Rewriting window in milliseconds. 0 or unset keeps rewriting on.
    pub refreeze_ms: Option<u64>,
}

/// Discovery polling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Delay between polls in milliseconds.
    pub poll_interval_ms: u64,
    /// Polls before giving up.
    pub max_attempts: u32,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the settings database.
    /// Defaults to `~/.local/share/stanzatap/settings.db`
    pub database_path: Option<PathBuf>,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            log_filter: None,
            level: LogLevel::default().to_string(),
            absolute_time: false,
            filter_realtime: None,
            thaw_ice: false,
            refreeze_ms: None,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let locator = LocatorConfig::default();
        Self {
            poll_interval_ms: u64::try_from(locator.poll_interval.as_millis()).unwrap_or(500),
            max_attempts: locator.max_attempts,
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
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

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
        if self.tap.level.parse::<LogLevel>().is_err() {
            return Err(Error::ConfigValidation {
                message: format!(
                    "unknown level '{}', expected one of {}",
                    self.tap.level,
                    LogLevel::NAMES.join(", ")
                ),
            });
        }

        let patterns = [
            ("log_filter", &self.tap.log_filter),
            ("filter_realtime", &self.tap.filter_realtime),
        ];
        for (field, pattern) in patterns {
            if let Some(pattern) = pattern {
                if regex::Regex::new(pattern).is_err() {
                    return Err(Error::ConfigValidation {
                        message: format!("invalid regex pattern in {field}: {pattern}"),
                    });
                }
            }
        }

        if self.discovery.poll_interval_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "poll_interval_ms must be greater than 0".to_string(),
            });
        }

        if self.discovery.max_attempts == 0 {
            return Err(Error::ConfigValidation {
                message: "max_attempts must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// The configured log filter as configurator input.
    #[must_use]
    pub fn log_filter_spec(&self) -> Option<PatternSpec> {
        self.tap.log_filter.clone().map(PatternSpec::from)
    }

    /// The `[tap]` section as configurator options.
    #[must_use]
    pub fn tap_options(&self) -> TapOptions {
        TapOptions {
            absolute_time: self.tap.absolute_time,
            filter_realtime: self.tap.filter_realtime.clone().map(PatternSpec::from),
            mangle_stanzas: None,
            thaw_ice: self.tap.thaw_ice,
            refreeze: self.tap.refreeze_ms.map(Duration::from_millis),
        }
    }

    /// Pretty-printed JSON form, as shown by `config show --json`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Discovery polling parameters.
    #[must_use]
    pub fn locator_config(&self) -> LocatorConfig {
        LocatorConfig {
            poll_interval: Duration::from_millis(self.discovery.poll_interval_ms),
            max_attempts: self.discovery.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.tap.level, "log");
        assert!(config.tap.log_filter.is_none());
        assert!(!config.tap.thaw_ice);
        assert_eq!(config.discovery.poll_interval_ms, 500);
        assert_eq!(config.discovery.max_attempts, 101);
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_unknown_level() {
        let mut config = Config::default();
        config.tap.level = "verbose".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("unknown level"));
    }

    #[test]
    fn test_validate_invalid_regex() {
        let mut config = Config::default();
        config.tap.filter_realtime = Some("[invalid".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("invalid regex"));
        assert!(err.contains("filter_realtime"));
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config = Config::default();
        config.discovery.poll_interval_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("poll_interval_ms"));
    }

    #[test]
    fn test_validate_zero_attempts() {
        let mut config = Config::default();
        config.discovery.max_attempts = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_attempts"));
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("stanzatap"));
        assert!(path.to_string_lossy().contains("settings.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("stanzatap"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_tap_options_conversion() {
        let mut config = Config::default();
        config.tap.absolute_time = true;
        config.tap.filter_realtime = Some("presence".to_string());
        config.tap.thaw_ice = true;
        config.tap.refreeze_ms = Some(1000);

        let options = config.tap_options();
        assert!(options.absolute_time);
        assert!(options.thaw_ice);
        assert!(options.mangle_stanzas.is_none());
        assert_eq!(options.refreeze, Some(Duration::from_secs(1)));
        assert!(matches!(
            options.filter_realtime,
            Some(PatternSpec::Text(ref s)) if s == "presence"
        ));
    }

    #[test]
    fn test_log_filter_spec() {
        let mut config = Config::default();
        assert!(config.log_filter_spec().is_none());

        config.tap.log_filter = Some("<iq".to_string());
        assert!(matches!(
            config.log_filter_spec(),
            Some(PatternSpec::Text(ref s)) if s == "<iq"
        ));
    }

    #[test]
    fn test_locator_config() {
        let locator = Config::default().locator_config();
        assert_eq!(locator, LocatorConfig::default());
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config.discovery, DiscoveryConfig::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[tap]
log_filter = "<message"
level = "debug"
thaw_ice = true
refreeze_ms = 2500

[discovery]
max_attempts = 10
"#
        )
        .unwrap();

        let config = Config::load_from(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.tap.log_filter.as_deref(), Some("<message"));
        assert_eq!(config.tap.level, "debug");
        assert!(config.tap.thaw_ice);
        assert_eq!(config.tap.refreeze_ms, Some(2500));
        assert_eq!(config.discovery.max_attempts, 10);
        assert_eq!(config.discovery.poll_interval_ms, 500);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tap]\nlevel = \"loud\"").unwrap();

        let err = Config::load_from(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("poll_interval_ms"));
        assert!(json.contains("thaw_ice"));
    }

    #[test]
    fn test_to_json_round_trips() {
        let mut config = Config::default();
        config.tap.thaw_ice = true;

        let json = config.to_json().unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert!(back.tap.thaw_ice);
        assert!(json.contains('\n'));
    }

    #[test]
    fn test_tap_config_deserialize() {
        let json = r#"{"level": "warn", "absolute_time": true}"#;
        let tap: TapConfig = serde_json::from_str(json).unwrap();
        assert_eq!(tap.level, "warn");
        assert!(tap.absolute_time);
        assert!(tap.log_filter.is_none());
    }
}
