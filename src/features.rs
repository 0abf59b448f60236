//! Feature derivation for the forecast models.
//!
//! Turns an ordered run of readings into the table the regressors were
//! trained on: calendar features, positional lags and trailing rolling
//! means per tracked variable. Cells that would reach before the first
//! reading are NaN, exactly like a shifted/rolled dataframe.
//!
//! **Column order is part of the model contract.** The regressors consume
//! the 22 columns that follow the three raw targets, in table order.

use chrono::{Datelike, NaiveDateTime, Timelike};
use ndarray::{s, Array2, ArrayView1};

use crate::reading::Reading;

/// Lag offsets, in rows (hours).
pub const LAG_HOURS: [usize; 4] = [1, 2, 3, 24];

/// Rolling-mean window sizes, in rows (hours).
pub const ROLLING_WINDOWS: [usize; 2] = [3, 24];

/// Rows needed before the newest row has every feature defined.
pub const MIN_HISTORY: usize = 25;

const TARGET_COUNT: usize = 3;
const CALENDAR_COUNT: usize = 4;

/// All table columns: raw targets, calendar, lags, rolling means.
pub const TABLE_COLUMNS: [&str; 25] = [
    "water_pH",
    "TDS",
    "water_temp",
    "hour",
    "day_of_week",
    "day_of_year",
    "month",
    "water_pH_lag_1hr",
    "water_pH_lag_2hr",
    "water_pH_lag_3hr",
    "water_pH_lag_24hr",
    "TDS_lag_1hr",
    "TDS_lag_2hr",
    "TDS_lag_3hr",
    "TDS_lag_24hr",
    "water_temp_lag_1hr",
    "water_temp_lag_2hr",
    "water_temp_lag_3hr",
    "water_temp_lag_24hr",
    "water_pH_roll_mean_3hr",
    "water_pH_roll_mean_24hr",
    "TDS_roll_mean_3hr",
    "TDS_roll_mean_24hr",
    "water_temp_roll_mean_3hr",
    "water_temp_roll_mean_24hr",
];

/// Model input columns (the table minus the raw targets).
pub fn feature_columns() -> &'static [&'static str] {
    &TABLE_COLUMNS[TARGET_COUNT..]
}

/// Derived feature table, one row per input reading.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    timestamps: Vec<NaiveDateTime>,
    values: Array2<f64>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn columns(&self) -> &'static [&'static str] {
        &TABLE_COLUMNS
    }

    pub fn timestamp(&self, row: usize) -> Option<NaiveDateTime> {
        self.timestamps.get(row).copied()
    }

    pub fn row(&self, row: usize) -> ArrayView1<'_, f64> {
        self.values.row(row)
    }

    pub fn is_complete(&self, row: usize) -> bool {
        self.values.row(row).iter().all(|v| !v.is_nan())
    }

    /// Rows without any undefined cell, in order.
    pub fn complete_rows(&self) -> impl Iterator<Item = (NaiveDateTime, ArrayView1<'_, f64>)> + '_ {
        (0..self.len())
            .filter(move |&i| self.is_complete(i))
            .map(move |i| (self.timestamps[i], self.values.row(i)))
    }

    /// Model input for the newest row, or `None` when that row still has
    /// undefined lag/rolling cells (too little history).
    pub fn latest_feature_vector(&self) -> Option<Vec<f64>> {
        let last = self.len().checked_sub(1)?;
        if !self.is_complete(last) {
            return None;
        }
        Some(self.values.slice(s![last, TARGET_COUNT..]).to_vec())
    }
}

/// Derive the full feature table for `readings` (assumed ascending).
pub fn derive_features(readings: &[Reading]) -> FeatureTable {
    let n = readings.len();
    let mut values = Array2::from_elem((n, TABLE_COLUMNS.len()), f64::NAN);

    for (t, reading) in readings.iter().enumerate() {
        let ts = reading.timestamp;
        let targets = reading.values();
        for (c, v) in targets.iter().enumerate() {
            values[[t, c]] = *v;
        }
        values[[t, 3]] = ts.hour() as f64;
        values[[t, 4]] = ts.weekday().num_days_from_monday() as f64;
        values[[t, 5]] = ts.ordinal() as f64;
        values[[t, 6]] = ts.month() as f64;
    }

    let mut col = TARGET_COUNT + CALENDAR_COUNT;
    for target in 0..TARGET_COUNT {
        for lag in LAG_HOURS {
            for t in lag..n {
                values[[t, col]] = values[[t - lag, target]];
            }
            col += 1;
        }
    }

    for target in 0..TARGET_COUNT {
        for window in ROLLING_WINDOWS {
            for t in window.saturating_sub(1)..n {
                let sum: f64 = values.slice(s![t + 1 - window..=t, target]).sum();
                values[[t, col]] = sum / window as f64;
            }
            col += 1;
        }
    }

    FeatureTable {
        timestamps: readings.iter().map(|r| r.timestamp).collect(),
        values,
    }
}
