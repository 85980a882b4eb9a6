//! Layered configuration for the log relay.
//!
//! Sources, later ones winning:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides (applied by the caller)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `WIRESLACK_` and use double
//! underscores to separate nested levels:
//! - `WIRESLACK_SINK__WEBHOOK=https://hooks.slack.com/...` sets `sink.webhook`
//! - `WIRESLACK_POLL_INTERVAL_SECS=30` sets `poll_interval_secs`
//! - `WIRESLACK_DIRECTORY__ENABLED=false` sets `directory.enabled`
//! - `WIRESLACK_TARGETS=http://a/,http://b/` sets `targets` (comma-separated)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::directory::LongitudeConvention;
use crate::error::ConfigError;
use crate::processor::{DEFAULT_NOISE_FILTERS, ProcessorOptions, WatermarkScope};

const ENV_PREFIX: &str = "WIRESLACK_";
const LOCAL_CONFIG_FILE: &str = "wireslack.toml";

/// Accept either a list or a single comma-separated string.
fn list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrCsv {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match ListOrCsv::deserialize(deserializer)? {
        ListOrCsv::List(list) => list,
        ListOrCsv::Csv(csv) => csv
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect(),
    })
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Log page addresses to poll (`http://`, `https://` or `file://`)
    #[serde(default, deserialize_with = "list_or_csv")]
    pub targets: Vec<String>,

    /// Seconds between polls of each target
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Per-request timeout for target fetches
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// IANA zone the log timestamps are written in
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default)]
    pub verbose: bool,

    /// Snapshots buffered between pollers and the processor
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub sink: SinkConfig,

    #[serde(default)]
    pub processor: ProcessorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DirectoryConfig {
    /// Enrich notifications from the active node/room listings
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_nodes_url")]
    pub nodes_url: String,

    /// Room listing; rooms are not resolved when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms_url: Option<String>,

    #[serde(default = "default_directory_refresh")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_directory_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub longitude_convention: LongitudeConvention,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SinkConfig {
    /// Slack incoming webhook URL
    #[serde(default)]
    pub webhook: String,

    /// Log notifications instead of posting them
    #[serde(default)]
    pub dry: bool,

    #[serde(default = "default_sink_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProcessorConfig {
    /// Messages containing any of these substrings are never posted
    #[serde(default = "default_noise_filters")]
    pub noise_filters: Vec<String>,

    #[serde(default)]
    pub watermark_scope: WatermarkScope,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Level for everything without a module override
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module levels, e.g. `wireslack::poller = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_true() -> bool { true }
fn default_poll_interval() -> u64 { 10 }
fn default_fetch_timeout() -> u64 { 5 }
fn default_timezone() -> String { "UTC".to_string() }
fn default_queue_capacity() -> usize { 16 }
fn default_nodes_url() -> String { "https://www.yaesu.com/jp/en/wires-x/id/active_node.php".to_string() }
fn default_rooms_url() -> String { "https://www.yaesu.com/jp/en/wires-x/id/active_room.php".to_string() }
fn default_directory_refresh() -> u64 { 1200 }
fn default_directory_timeout() -> u64 { 30 }
fn default_sink_timeout() -> u64 { 10 }
fn default_log_level() -> String { "info".to_string() }
fn default_noise_filters() -> Vec<String> {
    DEFAULT_NOISE_FILTERS.iter().map(|s| s.to_string()).collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            poll_interval_secs: default_poll_interval(),
            fetch_timeout_secs: default_fetch_timeout(),
            timezone: default_timezone(),
            verbose: false,
            queue_capacity: default_queue_capacity(),
            directory: DirectoryConfig::default(),
            sink: SinkConfig::default(),
            processor: ProcessorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            nodes_url: default_nodes_url(),
            rooms_url: Some(default_rooms_url()),
            refresh_interval_secs: default_directory_refresh(),
            timeout_secs: default_directory_timeout(),
            longitude_convention: LongitudeConvention::default(),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            webhook: String::new(),
            dry: false,
            timeout_secs: default_sink_timeout(),
        }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            noise_filters: default_noise_filters(),
            watermark_scope: WatermarkScope::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Copy of this config with the crate's own modules at `debug`.
    pub fn verbose(&self) -> Self {
        let mut config = self.clone();
        config
            .modules
            .entry(env!("CARGO_CRATE_NAME").to_string())
            .or_insert_with(|| "debug".to_string());
        config
    }
}

impl Settings {
    /// Load configuration from all sources.
    ///
    /// An explicit `config` path must exist. Without one, the first existing
    /// file of `./wireslack.toml` and `<config dir>/wireslack/settings.toml`
    /// is used, if any.
    pub fn load(config: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match config {
            Some(path) if !path.exists() => {
                return Err(ConfigError::Load {
                    reason: format!("{} does not exist", path.display()),
                });
            }
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_file(),
        };

        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment
            // Double underscore separates nested levels, single underscore
            // stays part of the field name
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(ConfigError::from)
    }

    /// Load configuration from a specific file, ignoring the lookup chain.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load(Some(path.as_ref()))
    }

    fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        Self::user_config_path().filter(|path| path.exists())
    }

    /// `<config dir>/wireslack/settings.toml`, if the platform has a config dir.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("wireslack").join("settings.toml"))
    }

    /// Reject settings the relay cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sink.webhook.trim().is_empty() {
            return Err(ConfigError::MissingWebhook);
        }
        if self.targets.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::MissingTargets);
        }
        self.timezone()?;

        let intervals = [
            ("poll_interval_secs", self.poll_interval_secs),
            ("fetch_timeout_secs", self.fetch_timeout_secs),
            ("sink.timeout_secs", self.sink.timeout_secs),
        ];
        for (field, value) in intervals {
            if value == 0 {
                return Err(ConfigError::ZeroInterval { field });
            }
        }
        if self.directory.enabled {
            if self.directory.refresh_interval_secs == 0 {
                return Err(ConfigError::ZeroInterval {
                    field: "directory.refresh_interval_secs",
                });
            }
            if self.directory.timeout_secs == 0 {
                return Err(ConfigError::ZeroInterval {
                    field: "directory.timeout_secs",
                });
            }
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "queue_capacity",
            });
        }
        Ok(())
    }

    /// The configured log time zone.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::InvalidTimezone {
                name: self.timezone.clone(),
                reason: e.to_string(),
            })
    }

    /// Non-empty targets, trimmed.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(|t| t.trim()).filter(|t| !t.is_empty())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn processor_options(&self) -> ProcessorOptions {
        ProcessorOptions {
            noise_filters: self.processor.noise_filters.clone(),
            scope: self.processor.watermark_scope,
        }
    }

    /// Logging config with the `verbose` flag folded in.
    pub fn effective_logging(&self) -> LoggingConfig {
        if self.verbose {
            self.logging.verbose()
        } else {
            self.logging.clone()
        }
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let save_error = |reason: String| ConfigError::Save {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| save_error(e.to_string()))?;
        }
        let toml_string = self.to_toml().map_err(save_error)?;
        std::fs::write(path, toml_string).map_err(|e| save_error(e.to_string()))
    }

    /// Render the settings as TOML.
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| e.to_string())
    }

    /// Create a default settings file in the current directory.
    pub fn init_config_file(force: bool) -> Result<PathBuf, ConfigError> {
        let config_path = PathBuf::from(LOCAL_CONFIG_FILE);
        if !force && config_path.exists() {
            return Err(ConfigError::AlreadyExists { path: config_path });
        }
        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn valid() -> Settings {
        Settings {
            targets: vec!["http://127.0.0.1/log".to_string()],
            sink: SinkConfig {
                webhook: "https://hooks.slack.invalid/T000".to_string(),
                ..SinkConfig::default()
            },
            ..Settings::default()
        }
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.poll_interval_secs, 10);
        assert_eq!(settings.fetch_timeout_secs, 5);
        assert_eq!(settings.timezone, "UTC");
        assert_eq!(settings.directory.refresh_interval_secs, 1200);
        assert_eq!(settings.directory.timeout_secs, 30);
        assert!(settings.directory.enabled);
        assert_eq!(settings.processor.noise_filters, vec!["Browser connected from"]);
        assert_eq!(settings.processor.watermark_scope, WatermarkScope::Global);
        assert_eq!(
            settings.directory.longitude_convention,
            LongitudeConvention::EastNegative
        );
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
targets = ["http://10.0.0.5:46190/", "file:///tmp/room.html"]
poll_interval_secs = 30
timezone = "Europe/Zurich"

[directory]
enabled = false
longitude_convention = "west_negative"

[sink]
webhook = "https://hooks.slack.invalid/T000"
dry = true

[processor]
noise_filters = ["Browser connected from", "Heartbeat"]
watermark_scope = "per_source"

[logging.modules]
"wireslack::poller" = "trace"
"#;
        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.targets.len(), 2);
        assert_eq!(settings.poll_interval_secs, 30);
        assert_eq!(settings.timezone().unwrap(), chrono_tz::Europe::Zurich);
        assert!(!settings.directory.enabled);
        assert_eq!(
            settings.directory.longitude_convention,
            LongitudeConvention::WestNegative
        );
        assert!(settings.sink.dry);
        assert_eq!(settings.processor.noise_filters.len(), 2);
        assert_eq!(settings.processor.watermark_scope, WatermarkScope::PerSource);
        assert_eq!(settings.logging.modules["wireslack::poller"], "trace");
        // Unset values keep their defaults
        assert_eq!(settings.fetch_timeout_secs, 5);
        assert_eq!(settings.logging.default, "info");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = Settings::load_from(temp_dir.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::Load { .. })));
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = valid();
        settings.poll_interval_secs = 42;
        settings.directory.rooms_url = None;
        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.poll_interval_secs, 42);
        assert_eq!(loaded.sink.webhook, settings.sink.webhook);
    }

    #[test]
    fn test_validate() {
        assert!(valid().validate().is_ok());

        let mut settings = valid();
        settings.sink.webhook.clear();
        assert!(matches!(settings.validate(), Err(ConfigError::MissingWebhook)));

        let mut settings = valid();
        settings.targets = vec![" ".to_string()];
        assert!(matches!(settings.validate(), Err(ConfigError::MissingTargets)));

        let mut settings = valid();
        settings.timezone = "Mars/Olympus_Mons".to_string();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidTimezone { .. })
        ));

        let mut settings = valid();
        settings.poll_interval_secs = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::ZeroInterval {
                field: "poll_interval_secs"
            })
        ));

        // Directory intervals only matter when the directory is used
        let mut settings = valid();
        settings.directory.refresh_interval_secs = 0;
        assert!(settings.validate().is_err());
        settings.directory.enabled = false;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_verbose_lowers_crate_level() {
        let mut settings = valid();
        assert!(settings.effective_logging().modules.is_empty());

        settings.verbose = true;
        let logging = settings.effective_logging();
        assert_eq!(logging.modules["wireslack"], "debug");
        assert_eq!(logging.default, "info");
    }

    #[test]
    fn test_targets_skip_blank_entries() {
        let mut settings = valid();
        settings.targets = vec![" http://a/ ".to_string(), String::new()];
        assert_eq!(settings.targets().collect::<Vec<_>>(), vec!["http://a/"]);
    }

    #[test]
    fn test_targets_from_comma_separated_string() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(
            &config_path,
            "targets = \"http://a/ , file:///tmp/room.html,,\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.targets, vec!["http://a/", "file:///tmp/room.html"]);
    }
}
