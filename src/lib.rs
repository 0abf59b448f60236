//! Water-quality forecasting service
//!
//! Hourly sensor readings (pH, TDS, water temperature) are turned into a
//! 12-hour autoregressive forecast:
//! - Calendar, lag and rolling-mean feature derivation
//! - Random-forest regressors per variable plus a status classifier
//! - Historical reading store (SQLite)
//! - HTTP API for ingest, latest reading and forecasts

pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod forecast;
pub mod history;
pub mod predictor;
pub mod reading;
pub mod server;
pub mod simulate;
pub mod store;
pub mod utils;

// Re-exports for convenience
pub use error::{ForecastError, PredictorError};
pub use forecast::{Forecast, ForecastRecord, Forecaster, WaterStatus};
pub use predictor::ModelSet;
pub use reading::Reading;
pub use store::{ReadingStore, SqliteReadingStore};
