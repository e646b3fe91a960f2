//! # Emulator Configuration
//!
//! All timing and thermal constants of the emulated printer are configurable.
//! Every section is optional; missing keys fall back to the values the real
//! Select Mini V2 exhibits.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [server]
//! bind_address = "127.0.0.1"
//! port = 8080
//!
//! [thermal]
//! room_temperature = 25
//! fluctuation = 3
//! convergence_period_ms = 500
//!
//! [protocol]
//! command_delay_ms = 2000
//!
//! [upload]
//! chunk_size = 4096
//! chunk_delay_ms = 10
//! ```

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct for the emulator.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub thermal: ThermalConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

impl Config {
    /// Reject values that would stall or spin the background tasks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thermal.fluctuation < 0 {
            return Err(ConfigError::Invalid(format!(
                "thermal.fluctuation must not be negative, got {}",
                self.thermal.fluctuation
            )));
        }
        if self.thermal.ambient_drift < 0 || self.thermal.convergence_max_step < 0 {
            return Err(ConfigError::Invalid(
                "thermal step sizes must not be negative".to_string(),
            ));
        }
        if self.thermal.convergence_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "thermal.convergence_period_ms must be greater than zero".to_string(),
            ));
        }
        if self.upload.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "upload.chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

/// Thermal simulation constants, in whole degrees.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThermalConfig {
    #[serde(default = "default_room_temperature")]
    pub room_temperature: i32,
    #[serde(default = "default_fluctuation")]
    pub fluctuation: i32,
    #[serde(default = "default_ambient_drift")]
    pub ambient_drift: i32,
    #[serde(default = "default_convergence_period_ms")]
    pub convergence_period_ms: u64,
    #[serde(default = "default_convergence_max_step")]
    pub convergence_max_step: i32,
}

impl ThermalConfig {
    /// Lowest temperature either heater may ever report.
    pub fn floor(&self) -> i32 {
        self.room_temperature - self.fluctuation
    }

    pub fn convergence_period(&self) -> Duration {
        Duration::from_millis(self.convergence_period_ms)
    }
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            room_temperature: default_room_temperature(),
            fluctuation: default_fluctuation(),
            ambient_drift: default_ambient_drift(),
            convergence_period_ms: default_convergence_period_ms(),
            convergence_max_step: default_convergence_max_step(),
        }
    }
}

/// Command latency emulation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProtocolConfig {
    #[serde(default = "default_command_delay_ms")]
    pub command_delay_ms: u64,
}

impl ProtocolConfig {
    pub fn command_delay(&self) -> Duration {
        Duration::from_millis(self.command_delay_ms)
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            command_delay_ms: default_command_delay_ms(),
        }
    }
}

/// Simulated storage bandwidth for `POST /upload`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
}

impl UploadConfig {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_delay_ms: default_chunk_delay_ms(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    80
}
fn default_room_temperature() -> i32 {
    25
}
fn default_fluctuation() -> i32 {
    3
}
fn default_ambient_drift() -> i32 {
    1
}
fn default_convergence_period_ms() -> u64 {
    500
}
fn default_convergence_max_step() -> i32 {
    5
}
fn default_command_delay_ms() -> u64 {
    2000
}
fn default_chunk_size() -> usize {
    4096
}
fn default_chunk_delay_ms() -> u64 {
    10
}

/// Load and validate a configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    match load_config(path.as_ref()) {
        Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(
                "No configuration at '{}', using defaults",
                path.as_ref().display()
            );
            Ok(Config::default())
        }
        other => other,
    }
}
