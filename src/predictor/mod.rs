//! Trained predictors
//!
//! The forecast loop only sees two narrow seams: a `Regressor` mapping a
//! feature vector to one value, and a `Classifier` labelling a
//! `(ph, tds, temperature)` triple. Implementations must be stateless
//! once loaded so one `ModelSet` can serve concurrent runs.

pub mod forest;

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::error::PredictorError;

pub use forest::{ForestClassifier, ForestRegressor, ModelLoadError};

pub const PH_MODEL_FILE: &str = "model_water_ph_rf.json";
pub const TDS_MODEL_FILE: &str = "model_tds_rf.json";
pub const TEMPERATURE_MODEL_FILE: &str = "model_water_temp_rf.json";
pub const CLASSIFIER_MODEL_FILE: &str = "model_klasifikasi.json";

pub trait Regressor: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<f64, PredictorError>;
}

pub trait Classifier: Send + Sync {
    fn classify(&self, ph: f64, tds: f64, temperature: f64) -> Result<Classification, PredictorError>;
}

/// Classifier output: the predicted label and the probability of label 1
/// ("needs water change").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: u8,
    pub probability: f64,
}

/// The three per-variable regressors and the status classifier.
#[derive(Clone)]
pub struct ModelSet {
    pub ph: Arc<dyn Regressor>,
    pub tds: Arc<dyn Regressor>,
    pub temperature: Arc<dyn Regressor>,
    pub classifier: Arc<dyn Classifier>,
}

impl ModelSet {
    pub fn new(
        ph: Arc<dyn Regressor>,
        tds: Arc<dyn Regressor>,
        temperature: Arc<dyn Regressor>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            ph,
            tds,
            temperature,
            classifier,
        }
    }

    /// Load the exported forest models from `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
        let dir = dir.as_ref();
        let ph = ForestRegressor::from_file(dir.join(PH_MODEL_FILE))?;
        let tds = ForestRegressor::from_file(dir.join(TDS_MODEL_FILE))?;
        let temperature = ForestRegressor::from_file(dir.join(TEMPERATURE_MODEL_FILE))?;
        let classifier = ForestClassifier::from_file(dir.join(CLASSIFIER_MODEL_FILE))?;

        info!(
            "🌲 Loaded models from {} (trees: ph={}, tds={}, temp={}, status={})",
            dir.display(),
            ph.tree_count(),
            tds.tree_count(),
            temperature.tree_count(),
            classifier.tree_count()
        );

        Ok(Self::new(
            Arc::new(ph),
            Arc::new(tds),
            Arc::new(temperature),
            Arc::new(classifier),
        ))
    }
}
