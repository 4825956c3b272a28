//! Configuration for the census service.
//!
//! One TOML file describes everything the service consumes: the scan roots,
//! walk options, snapshot output, retention policy, remote store, schedule,
//! HTTP API and logging. Every section except `paths` and `[output]` has
//! sensible defaults. Validation happens at load time and a validation
//! failure is fatal: the process must not start serving with a broken
//! configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration, one instance per process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Filesystem roots to inventory. Overlapping entries are deduplicated
    /// before scanning.
    pub paths: Vec<String>,

    #[serde(default)]
    pub scan: ScanOptions,

    pub output: OutputConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

/// Walk behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Skip (log and continue) configured roots that do not exist instead of
    /// failing the whole run.
    #[serde(default = "default_true")]
    pub ignore_missing_path: bool,

    /// Descend into symlinked directories. When disabled they are still
    /// listed as entries.
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            ignore_missing_path: true,
            follow_symlinks: false,
        }
    }
}

/// Snapshot output location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving dated snapshots, the latest file and the upload
    /// marker. Created on demand.
    pub directory: PathBuf,

    /// Name of the canonical latest snapshot inside `directory`.
    #[serde(default = "default_latest_filename")]
    pub latest_filename: String,
}

/// Dated snapshot retention.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Keep dated snapshots for this many days. Absent or zero disables
    /// cleanup entirely.
    #[serde(default)]
    pub days: Option<u32>,
}

impl RetentionConfig {
    /// Effective retention window. Zero is treated as disabled.
    pub fn keep_days(&self) -> Option<u32> {
        match self.days {
            None | Some(0) => None,
            other => other,
        }
    }
}

/// Remote object store (S3-compatible) for the latest snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub access_key_secret: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint URL for S3-compatible stores. Optional.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub bucket: Option<String>,

    /// Key prefix for uploaded objects.
    #[serde(default)]
    pub prefix: String,

    /// Object name the latest snapshot is uploaded as.
    #[serde(default = "default_latest_filename")]
    pub latest_object: String,

    /// Minimum days between uploads. Absent means every scan may upload.
    #[serde(default)]
    pub upload_interval_days: Option<u32>,
}

/// Periodic scan cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Fixed interval between scans, in minutes.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Wall-clock cadence "HH:MM", once per day. Overrides
    /// `interval_minutes` when set.
    #[serde(default)]
    pub daily_at: Option<String>,

    /// UTC offset in hours applied to `daily_at`.
    #[serde(default)]
    pub utc_offset_hours: i8,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: default_interval_minutes(),
            daily_at: None,
            utc_offset_hours: 0,
        }
    }
}

impl ScheduleConfig {
    /// Parsed `daily_at` as (hour, minute), if set and well-formed.
    pub fn daily_at_hm(&self) -> Option<(u32, u32)> {
        let text = self.daily_at.as_deref()?;
        let (hour, minute) = text.split_once(':')?;
        let hour: u32 = hour.parse().ok()?;
        let minute: u32 = minute.parse().ok()?;
        (hour < 24 && minute < 60).then_some((hour, minute))
    }
}

/// HTTP control surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared token required in the X-API-Token header. Absent bypasses
    /// authentication.
    #[serde(default)]
    pub token: Option<String>,

    /// Upper bound on concurrently running background actions.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
            token: None,
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

/// Logging destination and level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log file directory. Absent means stderr only.
    #[serde(default)]
    pub directory: Option<PathBuf>,

    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: None,
            level: default_log_level(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_latest_filename() -> String {
    "scan_latest.csv".to_string()
}

fn default_interval_minutes() -> u64 {
    1440
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields and cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.paths.is_empty() {
            return Err(ConfigError::Invalid("paths must not be empty".into()));
        }
        if self.paths.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid("paths entries must not be blank".into()));
        }
        if self.output.directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output.directory must not be empty".into()));
        }
        if self.output.latest_filename.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "output.latest_filename must not be blank".into(),
            ));
        }
        if self.remote.enabled {
            for (field, value) in [
                ("remote.access_key_id", &self.remote.access_key_id),
                ("remote.access_key_secret", &self.remote.access_key_secret),
                ("remote.region", &self.remote.region),
                ("remote.bucket", &self.remote.bucket),
            ] {
                if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                    return Err(ConfigError::Invalid(format!(
                        "{field} is required when remote.enabled is true"
                    )));
                }
            }
        }
        if self.schedule.daily_at.is_some() && self.schedule.daily_at_hm().is_none() {
            return Err(ConfigError::Invalid(
                "schedule.daily_at must be \"HH:MM\" with a valid time".into(),
            ));
        }
        if !(-12..=14).contains(&self.schedule.utc_offset_hours) {
            return Err(ConfigError::Invalid(
                "schedule.utc_offset_hours must be between -12 and 14".into(),
            ));
        }
        if self.schedule.enabled && self.schedule.daily_at.is_none() && self.schedule.interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "schedule.interval_minutes must be positive".into(),
            ));
        }
        if self.api.max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid(
                "api.max_concurrent_jobs must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
            paths = ["/data/a"]

            [output]
            directory = "/var/lib/census"
        "#
    }

    fn parse(toml_str: &str) -> AppConfig {
        toml::from_str(toml_str).expect("config should parse")
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse(minimal_toml());
        config.validate().expect("minimal config should validate");

        assert!(config.scan.ignore_missing_path);
        assert!(!config.scan.follow_symlinks);
        assert_eq!(config.output.latest_filename, "scan_latest.csv");
        assert_eq!(config.retention.keep_days(), None);
        assert!(!config.remote.enabled);
        assert!(config.schedule.enabled);
        assert_eq!(config.schedule.interval_minutes, 1440);
        assert!(config.api.enabled);
        assert_eq!(config.api.port, 5000);
        assert_eq!(config.api.max_concurrent_jobs, 4);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn zero_retention_days_means_disabled() {
        let config = parse(
            r#"
            paths = ["/data"]
            [output]
            directory = "/out"
            [retention]
            days = 0
        "#,
        );
        assert_eq!(config.retention.keep_days(), None);

        let config = parse(
            r#"
            paths = ["/data"]
            [output]
            directory = "/out"
            [retention]
            days = 30
        "#,
        );
        assert_eq!(config.retention.keep_days(), Some(30));
    }

    #[test]
    fn full_config_round_trips() {
        let config = parse(
            r#"
            paths = ["/data/a", "/data/b"]

            [scan]
            ignore_missing_path = false
            follow_symlinks = true

            [output]
            directory = "/var/lib/census"
            latest_filename = "latest.csv"

            [retention]
            days = 14

            [remote]
            enabled = true
            access_key_id = "id"
            access_key_secret = "secret"
            region = "us-east-1"
            endpoint = "http://localhost:9000"
            bucket = "snapshots"
            prefix = "inventory"
            latest_object = "latest.csv"
            upload_interval_days = 7

            [schedule]
            enabled = true
            daily_at = "03:30"
            utc_offset_hours = 8

            [api]
            enabled = true
            host = "127.0.0.1"
            port = 8080
            token = "secret-token"
            max_concurrent_jobs = 2

            [logging]
            directory = "/var/log/census"
            level = "debug"
        "#,
        );
        config.validate().expect("full config should validate");

        let rendered = toml::to_string_pretty(&config).expect("config should serialize");
        let reparsed: AppConfig = toml::from_str(&rendered).expect("rendered config should parse");
        assert_eq!(reparsed.paths, config.paths);
        assert_eq!(reparsed.schedule.daily_at_hm(), Some((3, 30)));
        assert_eq!(reparsed.api.token.as_deref(), Some("secret-token"));
        assert_eq!(reparsed.remote.upload_interval_days, Some(7));
    }

    #[test]
    fn empty_paths_rejected() {
        let config = parse(
            r#"
            paths = []
            [output]
            directory = "/out"
        "#,
        );
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn remote_enabled_requires_credentials() {
        let config = parse(
            r#"
            paths = ["/data"]
            [output]
            directory = "/out"
            [remote]
            enabled = true
            bucket = "snapshots"
        "#,
        );
        let err = config.validate().expect_err("missing credentials should fail");
        assert!(err.to_string().contains("remote.access_key_id"));
    }

    #[test]
    fn malformed_daily_at_rejected() {
        for bad in ["3am", "25:00", "12:60", "1230"] {
            let config = parse(&format!(
                r#"
                paths = ["/data"]
                [output]
                directory = "/out"
                [schedule]
                daily_at = "{bad}"
            "#
            ));
            assert!(
                config.validate().is_err(),
                "daily_at {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn load_reads_and_validates_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("census.toml");
        std::fs::write(&path, minimal_toml()).expect("write config");

        let config = AppConfig::load(&path).expect("load should succeed");
        assert_eq!(config.paths, vec!["/data/a".to_string()]);

        let missing = AppConfig::load(&dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
