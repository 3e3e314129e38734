//! ---
//! gh_section: "01-core-functionality"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Shared primitives and utilities for the simulation runtime."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use tracing::debug;

use crate::logging::LogFormat;

/// Preset names accepted by the simulation engine.
pub const KNOWN_PRESETS: [&str; 4] = ["optimal", "cold_start", "hot_humid", "random"];

fn default_preset() -> String {
    "optimal".to_owned()
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_storage_directory() -> PathBuf {
    PathBuf::from("target/greenhouse-data")
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_log_file() -> bool {
    true
}

fn default_metrics_enabled() -> bool {
    true
}

/// Primary configuration object for the greenhouse simulator.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    /// `None` when no candidate file existed and defaults were used.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "GREENHOUSE_CONFIG";

    /// Load configuration from disk, respecting the `GREENHOUSE_CONFIG` override.
    pub fn load<P: AsRef<Path>>(explicit: Option<&Path>, candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(explicit, candidates)?.config)
    }

    /// Load configuration together with the effective source path.
    ///
    /// An explicit path (environment or CLI) must exist. Fallback candidates
    /// are optional and defaults apply when none of them is present.
    pub fn load_with_source<P: AsRef<Path>>(
        explicit: Option<&Path>,
        candidates: &[P],
    ) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(anyhow!("configuration file {} does not exist", path.display()));
            }
            let config = Self::from_path(path)?;
            return Ok(LoadedAppConfig {
                config,
                source: Some(path.to_path_buf()),
            });
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        debug!("no configuration file found; using defaults");
        Ok(LoadedAppConfig {
            config: AppConfig::default(),
            source: None,
        })
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.simulation.validate()?;
        self.thresholds.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default = "default_tick_interval")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub interval: Duration,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub closed_loop: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            interval: default_tick_interval(),
            seed: None,
            closed_loop: false,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if !KNOWN_PRESETS.contains(&self.preset.as_str()) {
            return Err(anyhow!(
                "unknown simulation preset '{}' (expected one of: {})",
                self.preset,
                KNOWN_PRESETS.join(", ")
            ));
        }
        if self.interval.is_zero() {
            return Err(anyhow!("simulation interval must be greater than zero"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_directory")]
    pub directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_storage_directory(),
        }
    }
}

/// Control thresholds consumed by the closed-loop decision model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub temp_min: f64,
    pub temp_max: f64,
    pub temp_buffer: f64,
    pub humidity_min: f64,
    pub humidity_max: f64,
    pub humidity_buffer: f64,
    pub soil_min: f64,
    pub soil_buffer: f64,
    pub co2_min: f64,
    pub co2_buffer: f64,
    pub light_min_growth: f64,
    pub light_max_stress: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            temp_min: 20.0,
            temp_max: 25.0,
            temp_buffer: 1.5,
            humidity_min: 50.0,
            humidity_max: 80.0,
            humidity_buffer: 5.0,
            soil_min: 40.0,
            soil_buffer: 5.0,
            co2_min: 800.0,
            co2_buffer: 50.0,
            light_min_growth: 5_000.0,
            light_max_stress: 50_000.0,
        }
    }
}

impl ThresholdConfig {
    pub fn validate(&self) -> Result<()> {
        if self.temp_min >= self.temp_max {
            return Err(anyhow!("thresholds.temp_min must be below temp_max"));
        }
        if self.humidity_min >= self.humidity_max {
            return Err(anyhow!("thresholds.humidity_min must be below humidity_max"));
        }
        if self.light_min_growth >= self.light_max_stress {
            return Err(anyhow!(
                "thresholds.light_min_growth must be below light_max_stress"
            ));
        }
        let buffers = [
            self.temp_buffer,
            self.humidity_buffer,
            self.soil_buffer,
            self.co2_buffer,
        ];
        if buffers.iter().any(|buffer| *buffer < 0.0) {
            return Err(anyhow!("threshold buffers must not be negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Filter directive used when neither `GREENHOUSE_LOG` nor `RUST_LOG` is set.
    #[serde(default)]
    pub level: Option<String>,
    /// Write the rolling JSON log file in addition to the console.
    #[serde(default = "default_log_file")]
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            level: None,
            file: default_log_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}
