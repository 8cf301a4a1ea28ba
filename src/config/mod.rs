//! Configuration module - environment variable parsing

use std::env;
use std::time::Duration;

use crate::util::time::{BROADCAST_TPS, SIMULATION_TPS};

/// Simulation configuration, loaded from environment variables with
/// built-in defaults suitable for production rooms
#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Simulation rate in ticks per second
    pub tick_hz: u32,
    /// Snapshot broadcast rate per second
    pub broadcast_hz: u32,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl SimConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let tick_hz = parse_rate("SIM_TICK_HZ", SIMULATION_TPS)?;
        let broadcast_hz = parse_rate("SIM_BROADCAST_HZ", BROADCAST_TPS)?;

        Ok(Self {
            tick_hz,
            broadcast_hz,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Fixed per-tick delta in seconds; never derived from wall time
    pub fn fixed_dt(&self) -> f32 {
        1.0 / self.tick_hz as f32
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_hz as u64)
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.broadcast_hz as u64)
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_hz: SIMULATION_TPS,
            broadcast_hz: BROADCAST_TPS,
            log_level: "info".to_string(),
        }
    }
}

fn parse_rate(var: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(var) {
        Ok(raw) => {
            let value: u32 = raw.parse().map_err(|_| ConfigError::InvalidRate(var))?;
            if value == 0 {
                return Err(ConfigError::InvalidRate(var));
            }
            Ok(value)
        }
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid rate in environment variable: {0}")]
    InvalidRate(&'static str),
}
