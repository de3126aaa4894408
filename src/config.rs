use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prefix of environment overrides, e.g. `WAVREC_RECORDER__SAMPLE_RATE=48000`
const ENV_PREFIX: &str = "WAVREC";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub recorder: RecorderSettings,
    pub logging: LoggingConfig,
}

/// Recorder defaults, used for any field a recording request leaves unset
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RecorderSettings {
    /// Where bare destination file names are placed
    pub recordings_path: PathBuf,
    /// Where sample spools are written during capture (default: OS temp dir)
    pub scratch_path: Option<PathBuf>,
    pub sample_rate: u32,
    pub channels: u16,
    pub byte_depth: u16,
    pub max_duration_secs: f64,
    /// Progress event cadence
    pub subscription_duration_ms: u64,
    pub metering_enabled: bool,
    /// Audio per device read
    pub buffer_duration_ms: u64,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            recordings_path: PathBuf::from("recordings"),
            scratch_path: None,
            sample_rate: 44100,
            channels: 1,
            byte_depth: 2,
            max_duration_secs: 10.0,
            subscription_duration_ms: 500,
            metering_enabled: true,
            buffer_duration_ms: 100,
        }
    }
}

impl RecorderSettings {
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_path.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing filter directive, overridden by `RUST_LOG`
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from `path` (any extension the `config` crate knows, or none)
    /// if it exists, then apply `WAVREC_*` environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}
