//! Configuration management for the deskgauge monitor
//!
//! Configuration comes from a TOML file, environment variables and built-in
//! defaults, in that order of precedence from lowest to highest: defaults are
//! overridden by the file, the file by the environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::metric::{MetricKind, SamplingSchedule};

/// Longest accepted sampling interval
const MAX_INTERVAL_MS: u64 = 60 * 60 * 1000;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the monitor
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Per-stream sampling configuration
    pub sampling: SamplingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Sampling cadence of each stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub memory: StreamConfig,
    pub temperature: StreamConfig,

    /// Drives both the upload and the download stream
    pub network: StreamConfig,
}

/// One stream's settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Whether the stream is started at all
    pub enabled: bool,

    /// Sampling interval in milliseconds
    pub interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,

    /// Emit JSON log lines instead of text
    pub json: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            memory: StreamConfig::every(5_000),
            temperature: StreamConfig::every(30_000),
            network: StreamConfig::every(2_000),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl StreamConfig {
    pub fn every(interval_ms: u64) -> Self {
        Self {
            enabled: true,
            interval_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl MonitorConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => ConfigError::PermissionDenied {
                path: path.to_string_lossy().to_string(),
            },
            _ => ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            },
        })?;

        let config: MonitorConfig = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = MonitorConfig::default();
        config.apply_overrides(env_var)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback order: env -> file -> defaults
    pub fn load_with_fallback<P: AsRef<Path>>(config_path: Option<P>) -> ConfigResult<Self> {
        let mut config = match config_path {
            Some(path) if path.as_ref().exists() => MonitorConfig::from_file(path)?,
            _ => MonitorConfig::default(),
        };

        config.apply_overrides(env_var)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DESKGAUGE_*` overrides, reading variables through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ms) = parse_var(&lookup, "DESKGAUGE_MEMORY_INTERVAL_MS")? {
            self.sampling.memory.interval_ms = ms;
        }
        if let Some(ms) = parse_var(&lookup, "DESKGAUGE_TEMPERATURE_INTERVAL_MS")? {
            self.sampling.temperature.interval_ms = ms;
        }
        if let Some(ms) = parse_var(&lookup, "DESKGAUGE_NETWORK_INTERVAL_MS")? {
            self.sampling.network.interval_ms = ms;
        }
        if let Some(enabled) = parse_var(&lookup, "DESKGAUGE_TEMPERATURE_ENABLED")? {
            self.sampling.temperature.enabled = enabled;
        }
        if let Some(level) = lookup("DESKGAUGE_LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        let streams = [
            ("sampling.memory", &self.sampling.memory),
            ("sampling.temperature", &self.sampling.temperature),
            ("sampling.network", &self.sampling.network),
        ];

        for (field, stream) in streams {
            if stream.enabled && (stream.interval_ms == 0 || stream.interval_ms > MAX_INTERVAL_MS) {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.interval_ms", field),
                    value: stream.interval_ms.to_string(),
                });
            }
        }

        if streams.iter().all(|(_, stream)| !stream.enabled) {
            return Err(ConfigError::ValidationFailed {
                reason: "every sampling stream is disabled".to_string(),
            });
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: self.logging.level.clone(),
            });
        }

        Ok(())
    }

    /// Schedules for every enabled stream, in panel order
    pub fn schedules(&self) -> Vec<SamplingSchedule> {
        let sampling = &self.sampling;
        MetricKind::ALL
            .iter()
            .filter_map(|&kind| {
                let stream = match kind {
                    MetricKind::MemoryPercent => sampling.memory,
                    MetricKind::CpuTemperature => sampling.temperature,
                    MetricKind::NetUploadRate | MetricKind::NetDownloadRate => sampling.network,
                };
                stream
                    .enabled
                    .then(|| SamplingSchedule::new(kind, stream.interval()))
            })
            .collect()
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("deskgauge").join("deskgauge.toml"))
            .ok_or_else(|| ConfigError::ValidationFailed {
                reason: "Unable to determine config directory".to_string(),
            })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|_| ConfigError::ValidationFailed {
                reason: format!("Unable to create config directory: {}", parent.display()),
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationFailed {
            reason: e.to_string(),
        })?;

        fs::write(path, content).map_err(|_| ConfigError::PermissionDenied {
            path: path.to_string_lossy().to_string(),
        })?;

        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError { reason: e.to_string() })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_var<F, T>(lookup: &F, name: &str) -> ConfigResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: name.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}
