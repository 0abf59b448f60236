//! End-to-end forecast runs over deterministic models.

use std::fs;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::json;

use aqua_forecast::features::{feature_columns, MIN_HISTORY};
use aqua_forecast::forecast::{forecast_steps, ForecastSettings};
use aqua_forecast::history::HistoryBuffer;
use aqua_forecast::predictor::{
    Classification, Classifier, Regressor, CLASSIFIER_MODEL_FILE, PH_MODEL_FILE, TDS_MODEL_FILE,
    TEMPERATURE_MODEL_FILE,
};
use aqua_forecast::store::{ReadingStore, SqliteReadingStore};
use aqua_forecast::{ForecastError, Forecaster, ModelSet, PredictorError, Reading, WaterStatus};

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 10)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn constant_history(n: usize) -> Vec<Reading> {
    (0..n as i64)
        .map(|h| Reading::new(start() + Duration::hours(h), 7.0, 300.0, 25.0))
        .collect()
}

/// Returns the 24-hour rolling mean of its target.
struct RollingMean {
    column: usize,
}

impl RollingMean {
    fn of(name: &str) -> Arc<dyn Regressor> {
        let column = feature_columns()
            .iter()
            .position(|c| *c == name)
            .expect("known feature column");
        Arc::new(Self { column })
    }
}

impl Regressor for RollingMean {
    fn predict(&self, features: &[f64]) -> Result<f64, PredictorError> {
        Ok(features[self.column])
    }
}

struct FixedClassifier(Classification);

impl Classifier for FixedClassifier {
    fn classify(&self, _: f64, _: f64, _: f64) -> Result<Classification, PredictorError> {
        Ok(self.0)
    }
}

fn mean_models(classification: Classification) -> ModelSet {
    ModelSet::new(
        RollingMean::of("water_pH_roll_mean_24hr"),
        RollingMean::of("TDS_roll_mean_24hr"),
        RollingMean::of("water_temp_roll_mean_24hr"),
        Arc::new(FixedClassifier(classification)),
    )
}

#[test]
fn test_constant_history_forecasts_constant_values() -> Result<()> {
    let forecaster = Forecaster::new(
        mean_models(Classification {
            label: 0,
            probability: 0.2,
        }),
        ForecastSettings::default(),
    );

    let forecast = forecaster.run(constant_history(48))?;
    let last = start() + Duration::hours(47);
    assert_eq!(forecast.anchor, last);
    assert_eq!(forecast.records.len(), 12);

    for (i, record) in forecast.records.iter().enumerate() {
        assert_eq!(record.step, i + 1);
        assert_eq!(record.time, last + Duration::hours(i as i64 + 1));
        assert_eq!(record.ph, 7.0);
        assert_eq!(record.tds, 300.0);
        assert_eq!(record.temperature, 25.0);
        assert_eq!(record.status, WaterStatus::Safe);
        assert_eq!(record.probability, 0.2);
    }
    Ok(())
}

#[test]
fn test_status_follows_classifier_label() -> Result<()> {
    let forecaster = Forecaster::new(
        mean_models(Classification {
            label: 1,
            probability: 0.87,
        }),
        ForecastSettings::default(),
    );

    let forecast = forecaster.run(constant_history(30))?;
    assert!(forecast
        .records
        .iter()
        .all(|r| r.status == WaterStatus::NeedsWaterChange));

    let body = serde_json::to_value(&forecast.records[0])?;
    assert_eq!(body["status"], "PERLU GANTI AIR");
    assert_eq!(body["prob"], "0.87");
    assert_eq!(body["waktu"], "2025-03-11 06:00:00");
    Ok(())
}

#[test]
fn test_buffer_grows_by_horizon() -> Result<()> {
    let mut buffer = HistoryBuffer::seed(constant_history(MIN_HISTORY), 48)?;
    let records = forecast_steps(
        &mut buffer,
        &mean_models(Classification {
            label: 0,
            probability: 0.0,
        }),
        5,
    )?;

    assert_eq!(records.len(), 5);
    assert_eq!(buffer.len(), MIN_HISTORY + 5);
    let stamps: Vec<_> = buffer.as_slice().iter().map(|r| r.timestamp).collect();
    assert!(stamps.windows(2).all(|w| w[1] - w[0] == Duration::hours(1)));
    Ok(())
}

#[test]
fn test_short_history_yields_no_records() {
    let forecaster = Forecaster::new(
        mean_models(Classification {
            label: 0,
            probability: 0.0,
        }),
        ForecastSettings::default(),
    );

    let err = forecaster.run(constant_history(MIN_HISTORY - 1)).unwrap_err();
    assert!(matches!(
        err,
        ForecastError::Precondition {
            required: MIN_HISTORY,
            available: 24
        }
    ));
    assert_eq!(err.kind(), "precondition");
}

fn constant_forest(value: f64) -> serde_json::Value {
    json!({
        "n_features": 22,
        "trees": [{
            "children_left": [1, -1, -1],
            "children_right": [2, -1, -1],
            "feature": [0, -2, -2],
            "threshold": [100.0, -2.0, -2.0],
            "value": [[value], [value], [value]],
        }],
    })
}

#[tokio::test]
async fn test_exported_models_over_sqlite_history() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join(PH_MODEL_FILE), constant_forest(7.456).to_string())?;
    fs::write(dir.path().join(TDS_MODEL_FILE), constant_forest(310.0).to_string())?;
    fs::write(dir.path().join(TEMPERATURE_MODEL_FILE), constant_forest(26.5).to_string())?;
    fs::write(
        dir.path().join(CLASSIFIER_MODEL_FILE),
        json!({
            "n_features": 3,
            "classes": [0, 1],
            "trees": [{
                "children_left": [1, -1, -1],
                "children_right": [2, -1, -1],
                "feature": [0, -2, -2],
                "threshold": [7.4, -2.0, -2.0],
                "value": [[10.0, 10.0], [9.0, 1.0], [2.0, 8.0]],
            }],
        })
        .to_string(),
    )?;

    let db = dir.path().join("sensor_data.db");
    let store = SqliteReadingStore::new(&db).await?;
    store.insert_many(&constant_history(60)).await?;

    let settings = ForecastSettings {
        horizon: 3,
        context_hours: 48,
    };
    let forecaster = Forecaster::new(ModelSet::load(dir.path())?, settings);
    let history = store.query_trailing(settings.context_hours).await?;
    assert_eq!(history.len(), 48);

    let forecast = forecaster.run(history)?;
    assert_eq!(forecast.records.len(), 3);
    for record in &forecast.records {
        assert_eq!(record.ph, 7.46);
        assert_eq!(record.tds, 310.0);
        assert_eq!(record.temperature, 26.5);
        assert_eq!(record.status, WaterStatus::NeedsWaterChange);
        assert_eq!(record.probability, 0.8);
    }

    // The run works on its own buffer; the store is untouched.
    assert_eq!(store.count().await?, 60);
    Ok(())
}
