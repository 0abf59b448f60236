//! Flat-file historical dataset
//!
//! Reads the cleaned sensor export (`created_date, water_pH, TDS,
//! water_temp`) used to seed the store, and writes the NaN-dropped feature
//! table used for offline training. Only the tooling binaries touch files;
//! the forecast path goes through the store.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::features::FeatureTable;
use crate::reading::{Reading, TIMESTAMP_FORMAT};

const TIMESTAMP_FORMATS: [&str; 4] = [
    TIMESTAMP_FORMAT,
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unrecognised timestamp {value:?}")]
    Timestamp { row: usize, value: String },
}

#[derive(Debug, Deserialize)]
struct HistoryRow {
    created_date: String,
    #[serde(rename = "water_pH")]
    water_ph: Option<f64>,
    #[serde(rename = "TDS")]
    tds: Option<f64>,
    water_temp: Option<f64>,
}

/// Readings parsed from a dataset file, ascending and one per timestamp.
#[derive(Debug, Default)]
pub struct LoadedHistory {
    pub readings: Vec<Reading>,
    /// Rows dropped for missing or non-finite values, or timestamps off the hour
    pub skipped: usize,
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

pub fn load_history_csv(path: impl AsRef<Path>) -> Result<LoadedHistory, DatasetError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_history(BufReader::new(file))
}

pub fn read_history<R: Read>(reader: R) -> Result<LoadedHistory, DatasetError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut loaded = LoadedHistory::default();

    for (i, result) in csv_reader.deserialize::<HistoryRow>().enumerate() {
        let row = result?;
        let line = i + 2; // header is line 1
        let timestamp = parse_timestamp(&row.created_date).ok_or_else(|| DatasetError::Timestamp {
            row: line,
            value: row.created_date.clone(),
        })?;

        let (Some(ph), Some(tds), Some(temperature)) = (row.water_ph, row.tds, row.water_temp) else {
            loaded.skipped += 1;
            continue;
        };
        let reading = Reading::new(timestamp, ph, tds, temperature);
        if let Err(e) = reading.validate() {
            warn!("Skipping row {}: {}", line, e);
            loaded.skipped += 1;
            continue;
        }
        loaded.readings.push(reading);
    }

    // Stable sort keeps file order within a timestamp, so the later row wins.
    loaded.readings.sort_by_key(|r| r.timestamp);
    loaded.readings.reverse();
    loaded.readings.dedup_by_key(|r| r.timestamp);
    loaded.readings.reverse();

    Ok(loaded)
}

/// Write the complete rows of `table` with a leading `created_date` column.
/// Returns the number of data rows written.
pub fn write_feature_csv<W: Write>(writer: W, table: &FeatureTable) -> Result<usize, DatasetError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec!["created_date"];
    header.extend_from_slice(table.columns());
    csv_writer.write_record(&header)?;

    let mut written = 0;
    for (timestamp, row) in table.complete_rows() {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(timestamp.format(TIMESTAMP_FORMAT).to_string());
        record.extend(row.iter().map(|v| v.to_string()));
        csv_writer.write_record(&record)?;
        written += 1;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::derive_features;

    #[test]
    fn test_read_history_sorts_dedups_and_skips() {
        let data = "\
created_date,water_pH,TDS,water_temp
2025-01-01 02:00:00,7.2,310,25.5
2025-01-01 00:00:00,7.0,300,25.0
2025-01-01 01:00:00,,305,25.2
2025-01-01T02:00:00,7.3,311,25.6
";
        let loaded = read_history(data.as_bytes()).unwrap();
        assert_eq!(loaded.skipped, 1);
        assert_eq!(loaded.readings.len(), 2);
        assert_eq!(loaded.readings[0].ph, 7.0);
        // Later duplicate row for 02:00 wins.
        assert_eq!(loaded.readings[1].ph, 7.3);
    }

    #[test]
    fn test_read_history_skips_off_hour_rows() {
        let data = "\
created_date,water_pH,TDS,water_temp
2025-01-01 00:00:00,7.0,300,25.0
2025-01-01 00:37:00,7.1,301,25.1
2025-01-01 01:00:00,7.2,302,25.2
";
        let loaded = read_history(data.as_bytes()).unwrap();
        assert_eq!(loaded.skipped, 1);
        let stamps: Vec<_> = loaded.readings.iter().map(|r| r.timestamp.to_string()).collect();
        assert_eq!(stamps, vec!["2025-01-01 00:00:00", "2025-01-01 01:00:00"]);
    }

    #[test]
    fn test_read_history_rejects_bad_timestamp() {
        let data = "created_date,water_pH,TDS,water_temp\nyesterday,7.0,300,25.0\n";
        let err = read_history(data.as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::Timestamp { row: 2, .. }));
    }

    #[test]
    fn test_write_feature_csv_drops_incomplete_rows() {
        let start = parse_timestamp("2025-01-01 00:00:00").unwrap();
        let readings: Vec<_> = (0..30)
            .map(|i| Reading::new(start + chrono::Duration::hours(i), 7.0, 300.0, 25.0))
            .collect();

        let mut out = Vec::new();
        let written = write_feature_csv(&mut out, &derive_features(&readings)).unwrap();
        assert_eq!(written, 6);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("created_date,water_pH,TDS,water_temp,hour"));
        assert_eq!(header.split(',').count(), 26);
        assert!(lines.next().unwrap().starts_with("2025-01-02 00:00:00,7,300,25,0,"));
    }
}
