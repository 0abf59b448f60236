//! Random readings for demos and load testing.

use std::ops::Range;

use chrono::NaiveDateTime;
use rand::Rng;

use crate::forecast::round2;
use crate::reading::Reading;

/// Uniform sampling ranges for each variable.
#[derive(Debug, Clone)]
pub struct ReadingRanges {
    pub ph: Range<f64>,
    pub tds: Range<f64>,
    pub temperature: Range<f64>,
}

/// Wide ranges used when the forecast trigger records its own input.
pub fn trigger_ranges() -> ReadingRanges {
    ReadingRanges {
        ph: 5.0..8.0,
        tds: 100.0..500.0,
        temperature: 18.0..30.0,
    }
}

/// Healthier ranges the sensor simulator posts.
pub fn sensor_ranges() -> ReadingRanges {
    ReadingRanges {
        ph: 6.5..8.5,
        tds: 150.0..400.0,
        temperature: 24.0..30.0,
    }
}

impl ReadingRanges {
    /// Draw a reading with values rounded to two decimals.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, timestamp: NaiveDateTime) -> Reading {
        Reading::new(
            timestamp,
            round2(rng.gen_range(self.ph.clone())),
            round2(rng.gen_range(self.tds.clone())),
            round2(rng.gen_range(self.temperature.clone())),
        )
    }
}
