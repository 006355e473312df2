//! ---
//! twin_section: "01-core-functionality"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Shared primitives and utilities for the twin runtime."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 4000))
}

fn default_event_buffer() -> usize {
    256
}

fn default_tick_interval() -> Duration {
    Duration::from_millis(3000)
}

fn default_window_capacity() -> usize {
    20
}

fn default_seed_frames() -> usize {
    20
}

fn default_log_capacity() -> usize {
    50
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9899))
}

/// Primary configuration object for the twin daemon.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    /// `None` when no file was found and built-in defaults are in effect.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "ARM_TWIN_CONFIG";

    /// Load configuration from disk together with the effective source path.
    ///
    /// The `ARM_TWIN_CONFIG` variable wins over `candidates`; a path named there
    /// must exist. When none of the candidates exist the defaults are returned.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
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
        Self::load_from_candidates(candidates)
    }

    fn load_from_candidates<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path.to_path_buf()),
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
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.simulation.validate()?;
        self.health.validate()?;
        if self.server.event_buffer == 0 {
            return Err(anyhow!("server.event_buffer must be greater than zero"));
        }
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

/// Network surface shared by the WebSocket and REST endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Events buffered per subscriber before a slow client starts losing them.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            event_buffer: default_event_buffer(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_tick_interval", rename = "tick_interval_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub tick_interval: Duration,
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
    #[serde(default = "default_seed_frames")]
    pub seed_frames: usize,
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            window_capacity: default_window_capacity(),
            seed_frames: default_seed_frames(),
            log_capacity: default_log_capacity(),
            random_seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(anyhow!("simulation.tick_interval_ms must be greater than zero"));
        }
        if self.window_capacity == 0 {
            return Err(anyhow!("simulation.window_capacity must be greater than zero"));
        }
        if self.seed_frames == 0 || self.seed_frames > self.window_capacity {
            return Err(anyhow!(
                "simulation.seed_frames must be between 1 and window_capacity ({})",
                self.window_capacity
            ));
        }
        if self.log_capacity == 0 {
            return Err(anyhow!("simulation.log_capacity must be greater than zero"));
        }
        Ok(())
    }
}

/// Tuning constants for the composite health score.
///
/// Penalties are applied per unit of excess above the matching threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    /// Lifetime health lost on every tick regardless of faults.
    pub wear_rate: f64,
    pub temp_threshold: f64,
    pub temp_penalty: f64,
    pub power_threshold: f64,
    pub power_penalty: f64,
    pub anomaly_threshold: f64,
    pub anomaly_penalty: f64,
    pub warning_penalty: f64,
    pub critical_penalty: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            wear_rate: 0.02,
            temp_threshold: 75.0,
            temp_penalty: 2.0,
            power_threshold: 2000.0,
            power_penalty: 0.02,
            anomaly_threshold: 0.3,
            anomaly_penalty: 50.0,
            warning_penalty: 5.0,
            critical_penalty: 15.0,
        }
    }
}

impl HealthConfig {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("wear_rate", self.wear_rate),
            ("temp_threshold", self.temp_threshold),
            ("temp_penalty", self.temp_penalty),
            ("power_threshold", self.power_threshold),
            ("power_penalty", self.power_penalty),
            ("anomaly_threshold", self.anomaly_threshold),
            ("anomaly_penalty", self.anomaly_penalty),
            ("warning_penalty", self.warning_penalty),
            ("critical_penalty", self.critical_penalty),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(anyhow!("health.{name} must be a finite, non-negative number"));
            }
        }
        if self.wear_rate > 100.0 {
            return Err(anyhow!("health.wear_rate must not exceed 100"));
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
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}
