//! Forecast output records and their wire shape.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};

use crate::reading::TIMESTAMP_FORMAT;

/// Water status derived from the classifier label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaterStatus {
    #[serde(rename = "AMAN")]
    Safe,
    #[serde(rename = "PERLU GANTI AIR")]
    NeedsWaterChange,
}

impl WaterStatus {
    /// Label 1 means "needs water change"; anything else is safe.
    pub fn from_label(label: u8) -> Self {
        if label == 1 {
            WaterStatus::NeedsWaterChange
        } else {
            WaterStatus::Safe
        }
    }
}

/// One forecast step. Readings are rounded to two decimals on construction;
/// the probability is kept raw and rounded once when serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRecord {
    #[serde(rename = "jam_ke")]
    pub step: usize,
    #[serde(rename = "waktu", serialize_with = "serialize_timestamp")]
    pub time: NaiveDateTime,
    pub ph: f64,
    pub tds: f64,
    #[serde(rename = "suhu")]
    pub temperature: f64,
    pub status: WaterStatus,
    #[serde(rename = "prob", serialize_with = "serialize_probability")]
    pub probability: f64,
}

impl ForecastRecord {
    pub fn new(
        step: usize,
        time: NaiveDateTime,
        ph: f64,
        tds: f64,
        temperature: f64,
        status: WaterStatus,
        probability: f64,
    ) -> Self {
        Self {
            step,
            time,
            ph: round2(ph),
            tds: round2(tds),
            temperature: round2(temperature),
            status,
            probability,
        }
    }
}

/// Round to two decimals the way the exact binary value prints: exact
/// ties go to even (`0.125` becomes `0.12`).
pub fn round2(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

pub(crate) fn serialize_timestamp<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
}

fn serialize_probability<S: Serializer>(p: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{p:.2}"))
}
