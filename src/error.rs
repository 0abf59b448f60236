//! Error taxonomy for forecast runs

use thiserror::Error;

use crate::store::StoreError;

/// Failure of a single predictor call.
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("expected {expected} input features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("model produced a non-finite output ({0})")]
    NonFinite(f64),

    #[error("malformed model: {0}")]
    Malformed(String),
}

/// Any of these aborts the whole run; callers never see a partial forecast.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("insufficient history: need at least {required} readings, have {available}")]
    Precondition { required: usize, available: usize },

    #[error("forecast horizon {horizon} is outside 1..={max}")]
    InvalidHorizon { horizon: usize, max: usize },

    #[error("invalid history: {0}")]
    InvalidHistory(String),

    #[error("{model} model failed at step {step}: {source}")]
    Predictor {
        model: &'static str,
        step: usize,
        #[source]
        source: PredictorError,
    },

    #[error("historical store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl ForecastError {
    /// Short machine-readable kind, used in HTTP error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::Precondition { .. } => "precondition",
            ForecastError::InvalidHorizon { .. } => "invalid_horizon",
            ForecastError::InvalidHistory(_) => "invalid_history",
            ForecastError::Predictor { .. } => "predictor",
            ForecastError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}
