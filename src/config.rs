//! Service configuration
//!
//! Values come from the environment (after `.env` is loaded by the binary),
//! falling back to defaults that match a local single-node deployment.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::features::MIN_HISTORY;
use crate::forecast::{ForecastSettings, MAX_CONTEXT_HOURS, MAX_HORIZON};

pub const ENV_BIND_ADDR: &str = "AQUA_BIND_ADDR";
pub const ENV_DB_PATH: &str = "AQUA_DB_PATH";
pub const ENV_MODEL_DIR: &str = "AQUA_MODEL_DIR";
pub const ENV_HORIZON: &str = "AQUA_FORECAST_HORIZON";
pub const ENV_CONTEXT_HOURS: &str = "AQUA_CONTEXT_HOURS";
pub const ENV_SIMULATE_INPUT: &str = "AQUA_SIMULATE_INPUT";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    /// SQLite file holding historical readings
    pub db_path: PathBuf,
    /// Directory with the exported forest models
    pub model_dir: PathBuf,
    pub forecast: ForecastSettings,
    /// Record a random reading before each triggered forecast
    pub simulate_input: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            db_path: PathBuf::from("sensor_data.db"),
            model_dir: PathBuf::from("models"),
            forecast: ForecastSettings::default(),
            simulate_input: false,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_BIND_ADDR) {
            config.bind_addr = value.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: ENV_BIND_ADDR,
                value: value.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(value) = lookup(ENV_DB_PATH) {
            config.db_path = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_MODEL_DIR) {
            config.model_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_HORIZON) {
            config.forecast.horizon = parse_bounded(ENV_HORIZON, &value, 1, MAX_HORIZON)?;
        }
        if let Some(value) = lookup(ENV_CONTEXT_HOURS) {
            config.forecast.context_hours = parse_bounded(ENV_CONTEXT_HOURS, &value, MIN_HISTORY, MAX_CONTEXT_HOURS)?;
        }
        if let Some(value) = lookup(ENV_SIMULATE_INPUT) {
            config.simulate_input = match value.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: ENV_SIMULATE_INPUT,
                        value,
                        reason: "expected a boolean".into(),
                    })
                }
            };
        }

        Ok(config)
    }
}

fn parse_bounded(key: &'static str, value: &str, min: usize, max: usize) -> Result<usize, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason,
    };
    let n: usize = value.trim().parse().map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?;
    if !(min..=max).contains(&n) {
        return Err(invalid(format!("must be within {min}..={max}")));
    }
    Ok(n)
}
