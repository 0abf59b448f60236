//! Autoregressive stepping
//!
//! Each step re-derives features over the buffer's trailing window, asks
//! the regressors for the next hour, classifies the result and appends the
//! unrounded prediction to the buffer so the next step's lags and rolling
//! means see it. Features are recomputed from scratch every step.

use chrono::Duration;
use tracing::{debug, warn};

use super::record::{ForecastRecord, WaterStatus};
use super::MAX_HORIZON;
use crate::error::{ForecastError, PredictorError};
use crate::features::{derive_features, MIN_HISTORY};
use crate::history::HistoryBuffer;
use crate::predictor::{ModelSet, Regressor};
use crate::reading::Reading;

/// Run `horizon` forecast steps, extending `buffer` by one synthetic
/// reading per step. Fails before the first step if the buffer cannot
/// yield a complete feature row; any later failure discards every record.
pub fn forecast_steps(
    buffer: &mut HistoryBuffer,
    models: &ModelSet,
    horizon: usize,
) -> Result<Vec<ForecastRecord>, ForecastError> {
    if horizon == 0 || horizon > MAX_HORIZON {
        return Err(ForecastError::InvalidHorizon {
            horizon,
            max: MAX_HORIZON,
        });
    }
    if buffer.len() < MIN_HISTORY {
        return Err(ForecastError::Precondition {
            required: MIN_HISTORY,
            available: buffer.len(),
        });
    }

    let mut records = Vec::with_capacity(horizon);
    for step in 1..=horizon {
        let table = derive_features(buffer.trailing_window(MIN_HISTORY));
        let features = table
            .latest_feature_vector()
            .ok_or(ForecastError::Precondition {
                required: MIN_HISTORY,
                available: buffer.len(),
            })?;

        let ph = predict(models.ph.as_ref(), "ph", step, &features)?;
        let tds = predict(models.tds.as_ref(), "tds", step, &features)?;
        let temperature = predict(models.temperature.as_ref(), "temperature", step, &features)?;

        let last = buffer.last().ok_or(ForecastError::Precondition {
            required: MIN_HISTORY,
            available: 0,
        })?;
        let time = last.timestamp + Duration::hours(1);

        let classification = models
            .classifier
            .classify(ph, tds, temperature)
            .map_err(|source| ForecastError::Predictor {
                model: "classifier",
                step,
                source,
            })?;
        let probability = classification.probability;
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(ForecastError::Predictor {
                model: "classifier",
                step,
                source: PredictorError::NonFinite(probability),
            });
        }

        let status = WaterStatus::from_label(classification.label);
        if (status == WaterStatus::NeedsWaterChange) != (probability >= 0.5) {
            warn!(
                step,
                label = classification.label,
                probability,
                "classifier label disagrees with a 0.5 probability threshold; using the label"
            );
        }

        debug!(step, %time, ph, tds, temperature, ?status, probability, "forecast step");
        records.push(ForecastRecord::new(step, time, ph, tds, temperature, status, probability));
        buffer.append(Reading::new(time, ph, tds, temperature))?;
    }

    Ok(records)
}

fn predict(model: &dyn Regressor, name: &'static str, step: usize, features: &[f64]) -> Result<f64, ForecastError> {
    let value = model
        .predict(features)
        .map_err(|source| ForecastError::Predictor { model: name, step, source })?;
    if !value.is_finite() {
        return Err(ForecastError::Predictor {
            model: name,
            step,
            source: PredictorError::NonFinite(value),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::feature_columns;
    use crate::predictor::{Classification, Classifier};
    use chrono::{NaiveDate, NaiveDateTime};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn buffer(n: usize) -> HistoryBuffer {
        let readings = (0..n)
            .map(|i| Reading::new(start() + Duration::hours(i as i64), 7.0, 300.0, 25.0))
            .collect();
        HistoryBuffer::seed(readings, 48).unwrap()
    }

    /// Returns the 1-hour lag of its column: a naive persistence model.
    struct LagOne(&'static str);

    impl Regressor for LagOne {
        fn predict(&self, features: &[f64]) -> Result<f64, PredictorError> {
            let name = format!("{}_lag_1hr", self.0);
            let idx = feature_columns().iter().position(|c| *c == name).unwrap();
            Ok(features[idx] + 0.1)
        }
    }

    struct Fixed(f64);

    impl Regressor for Fixed {
        fn predict(&self, _: &[f64]) -> Result<f64, PredictorError> {
            Ok(self.0)
        }
    }

    /// Fails on the n-th call.
    struct FailsAt {
        calls: AtomicUsize,
        at: usize,
    }

    impl Regressor for FailsAt {
        fn predict(&self, _: &[f64]) -> Result<f64, PredictorError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.at {
                Ok(f64::NAN)
            } else {
                Ok(25.0)
            }
        }
    }

    struct PhThreshold;

    impl Classifier for PhThreshold {
        fn classify(&self, ph: f64, _: f64, _: f64) -> Result<Classification, PredictorError> {
            let probability = if ph > 7.25 { 0.9 } else { 0.1 };
            Ok(Classification {
                label: u8::from(probability >= 0.5),
                probability,
            })
        }
    }

    fn models(temperature: Arc<dyn Regressor>) -> ModelSet {
        ModelSet::new(
            Arc::new(LagOne("water_pH")),
            Arc::new(Fixed(310.0)),
            temperature,
            Arc::new(PhThreshold),
        )
    }

    #[test]
    fn test_predictions_feed_back_into_history() {
        let mut buf = buffer(30);
        let records = forecast_steps(&mut buf, &models(Arc::new(Fixed(25.0))), 5).unwrap();

        // Each step sees the previous step's pH through the lag feature.
        let ph: Vec<f64> = records.iter().map(|r| r.ph).collect();
        assert_eq!(ph, vec![7.1, 7.2, 7.3, 7.4, 7.5]);
        assert_eq!(records[1].status, WaterStatus::Safe);
        assert_eq!(records[2].status, WaterStatus::NeedsWaterChange);
        assert_eq!(records[2].probability, 0.9);

        assert_eq!(buf.len(), 35);
        assert_eq!(buf.last().unwrap().timestamp, start() + Duration::hours(34));
    }

    #[test]
    fn test_short_buffer_fails_fast() {
        let mut buf = buffer(MIN_HISTORY - 1);
        let err = forecast_steps(&mut buf, &models(Arc::new(Fixed(25.0))), 12).unwrap_err();
        assert!(matches!(err, ForecastError::Precondition { required: 25, available: 24 }));
        assert_eq!(buf.len(), MIN_HISTORY - 1);
    }

    #[test]
    fn test_horizon_bounds() {
        let mut buf = buffer(30);
        let m = models(Arc::new(Fixed(25.0)));
        assert!(matches!(
            forecast_steps(&mut buf, &m, 0),
            Err(ForecastError::InvalidHorizon { .. })
        ));
        assert!(matches!(
            forecast_steps(&mut buf, &m, MAX_HORIZON + 1),
            Err(ForecastError::InvalidHorizon { .. })
        ));
    }

    #[test]
    fn test_non_finite_prediction_aborts_run() {
        let mut buf = buffer(30);
        let failing = Arc::new(FailsAt {
            calls: AtomicUsize::new(0),
            at: 4,
        });
        let err = forecast_steps(&mut buf, &models(failing), 12).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::Predictor {
                model: "temperature",
                step: 4,
                source: PredictorError::NonFinite(_)
            }
        ));
    }

    /// Errors from its n-th call on.
    struct BrokenClassifier {
        calls: AtomicUsize,
        at: usize,
    }

    impl Classifier for BrokenClassifier {
        fn classify(&self, _: f64, _: f64, _: f64) -> Result<Classification, PredictorError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.at {
                Err(PredictorError::Malformed("class distribution is empty".into()))
            } else {
                Ok(Classification {
                    label: 0,
                    probability: 0.1,
                })
            }
        }
    }

    struct OutOfRange;

    impl Classifier for OutOfRange {
        fn classify(&self, _: f64, _: f64, _: f64) -> Result<Classification, PredictorError> {
            Ok(Classification {
                label: 1,
                probability: 1.5,
            })
        }
    }

    #[test]
    fn test_classifier_failure_aborts_run() {
        let mut buf = buffer(30);
        let m = ModelSet::new(
            Arc::new(Fixed(7.0)),
            Arc::new(Fixed(300.0)),
            Arc::new(Fixed(25.0)),
            Arc::new(BrokenClassifier {
                calls: AtomicUsize::new(0),
                at: 3,
            }),
        );
        let err = forecast_steps(&mut buf, &m, 12).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::Predictor {
                model: "classifier",
                step: 3,
                source: PredictorError::Malformed(_)
            }
        ));
        assert_eq!(err.kind(), "predictor");
    }

    #[test]
    fn test_out_of_range_probability_aborts_run() {
        let mut buf = buffer(30);
        let m = ModelSet::new(
            Arc::new(Fixed(7.0)),
            Arc::new(Fixed(300.0)),
            Arc::new(Fixed(25.0)),
            Arc::new(OutOfRange),
        );
        let err = forecast_steps(&mut buf, &m, 2).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::Predictor {
                model: "classifier",
                step: 1,
                ..
            }
        ));
        assert_eq!(buf.len(), 30);
    }
}
