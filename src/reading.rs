//! Water-quality readings
//!
//! A `Reading` is one hour-aligned observation of the three tracked
//! variables. Real readings come from the store or the ingest endpoint;
//! synthetic ones are appended by the forecast loop.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire/storage format for reading timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    pub ph: f64,
    pub tds: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidReading {
    #[error("reading at {timestamp} has a non-finite {field} value")]
    NonFinite {
        timestamp: NaiveDateTime,
        field: &'static str,
    },

    #[error("reading timestamp {0} is not on the hour")]
    OffHour(NaiveDateTime),
}

impl Reading {
    pub fn new(timestamp: NaiveDateTime, ph: f64, tds: f64, temperature: f64) -> Self {
        Self {
            timestamp,
            ph,
            tds,
            temperature,
        }
    }

    /// Rejects NaN/inf values and timestamps off the hour. Only feature
    /// cells may be undefined, never readings.
    pub fn validate(&self) -> Result<(), InvalidReading> {
        if self.timestamp.minute() != 0 || self.timestamp.second() != 0 || self.timestamp.nanosecond() != 0 {
            return Err(InvalidReading::OffHour(self.timestamp));
        }
        for (field, value) in [
            ("ph", self.ph),
            ("tds", self.tds),
            ("temperature", self.temperature),
        ] {
            if !value.is_finite() {
                return Err(InvalidReading::NonFinite {
                    timestamp: self.timestamp,
                    field,
                });
            }
        }
        Ok(())
    }

    /// Values in model column order: `water_pH`, `TDS`, `water_temp`.
    pub fn values(&self) -> [f64; 3] {
        [self.ph, self.tds, self.temperature]
    }
}
