//! Per-run history buffer
//!
//! Holds the trailing window of real readings a forecast run starts from,
//! plus the synthetic readings the run appends. Each run owns its own
//! buffer, so concurrent runs never see each other's predictions.

use crate::error::ForecastError;
use crate::reading::Reading;

#[derive(Debug, Clone, Default)]
pub struct HistoryBuffer {
    rows: Vec<Reading>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a buffer from a snapshot of persisted history.
    ///
    /// Input may arrive in any order; it is sorted ascending and cut down to
    /// the trailing `window` rows. Duplicate timestamps and non-finite
    /// values are rejected.
    pub fn seed(mut readings: Vec<Reading>, window: usize) -> Result<Self, ForecastError> {
        for reading in &readings {
            reading
                .validate()
                .map_err(|e| ForecastError::InvalidHistory(e.to_string()))?;
        }

        readings.sort_by_key(|r| r.timestamp);
        if let Some(pair) = readings.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
            return Err(ForecastError::InvalidHistory(format!(
                "duplicate timestamp {}",
                pair[0].timestamp
            )));
        }

        let start = readings.len().saturating_sub(window);
        readings.drain(..start);
        Ok(Self { rows: readings })
    }

    /// Append a reading; its timestamp must be later than the current last row.
    pub fn append(&mut self, reading: Reading) -> Result<(), ForecastError> {
        if let Some(last) = self.rows.last() {
            if reading.timestamp <= last.timestamp {
                return Err(ForecastError::InvalidHistory(format!(
                    "appended timestamp {} does not follow {}",
                    reading.timestamp, last.timestamp
                )));
            }
        }
        self.rows.push(reading);
        Ok(())
    }

    /// The last `k` rows (or all rows if fewer), ascending.
    pub fn trailing_window(&self, k: usize) -> &[Reading] {
        let start = self.rows.len().saturating_sub(k);
        &self.rows[start..]
    }

    pub fn last(&self) -> Option<&Reading> {
        self.rows.last()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn as_slice(&self) -> &[Reading] {
        &self.rows
    }
}
