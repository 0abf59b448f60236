//! Forecast runs
//!
//! A `Forecaster` owns the loaded models and run settings. Every call to
//! `run` seeds a fresh `HistoryBuffer` from a history snapshot, steps it
//! forward and returns the result as a self-contained `Forecast`; nothing
//! is kept between runs.

pub mod record;
pub mod stepper;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::ForecastError;
use crate::features::MIN_HISTORY;
use crate::history::HistoryBuffer;
use crate::predictor::ModelSet;
use crate::reading::Reading;

pub use record::{round2, ForecastRecord, WaterStatus};
pub use stepper::forecast_steps;

pub const DEFAULT_HORIZON: usize = 12;
pub const DEFAULT_CONTEXT_HOURS: usize = 48;
pub const MAX_HORIZON: usize = 168;
pub const MAX_CONTEXT_HOURS: usize = 720;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastSettings {
    /// Steps (hours) to forecast.
    pub horizon: usize,
    /// Trailing real readings a run is seeded with.
    pub context_hours: usize,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
            context_hours: DEFAULT_CONTEXT_HOURS,
        }
    }
}

/// The output of one run.
#[derive(Debug, Clone)]
pub struct Forecast {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Timestamp of the last real reading the run started from.
    pub anchor: NaiveDateTime,
    pub records: Vec<ForecastRecord>,
}

pub struct Forecaster {
    models: ModelSet,
    settings: ForecastSettings,
}

impl Forecaster {
    pub fn new(models: ModelSet, settings: ForecastSettings) -> Self {
        Self { models, settings }
    }

    pub fn settings(&self) -> ForecastSettings {
        self.settings
    }

    /// Forecast the next `horizon` hours from a history snapshot.
    pub fn run(&self, history: Vec<Reading>) -> Result<Forecast, ForecastError> {
        let mut buffer = HistoryBuffer::seed(history, self.settings.context_hours)?;
        let anchor = buffer
            .last()
            .map(|r| r.timestamp)
            .ok_or(ForecastError::Precondition {
                required: MIN_HISTORY,
                available: 0,
            })?;

        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            %anchor,
            history = buffer.len(),
            horizon = self.settings.horizon,
            "📈 Starting forecast run"
        );

        let records = forecast_steps(&mut buffer, &self.models, self.settings.horizon)?;

        let flagged = records
            .iter()
            .filter(|r| r.status == WaterStatus::NeedsWaterChange)
            .count();
        info!(%run_id, steps = records.len(), flagged, "✅ Forecast run complete");

        Ok(Forecast {
            run_id,
            generated_at: Utc::now(),
            anchor,
            records,
        })
    }
}
