//! SQLite-backed reading store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use tokio::task;
use tracing::debug;

use super::{ReadingStore, StoreError};
use crate::reading::{Reading, TIMESTAMP_FORMAT};

const UPSERT_SQL: &str = "INSERT INTO sensor_data (create_date, water_ph, tds, water_temp) \
     VALUES (?1, ?2, ?3, ?4) \
     ON CONFLICT(create_date) DO UPDATE SET \
     water_ph = excluded.water_ph, tds = excluded.tds, water_temp = excluded.water_temp";

#[derive(Clone)]
pub struct SqliteReadingStore {
    db_path: PathBuf,
}

impl SqliteReadingStore {
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = db_path.as_ref().to_path_buf();
        let path_clone = path.clone();

        task::spawn_blocking(move || {
            let conn = Connection::open(&path_clone)?;
            conn.execute(
                r#"
                CREATE TABLE IF NOT EXISTS sensor_data (
                    create_date TEXT PRIMARY KEY,
                    water_ph REAL NOT NULL,
                    tds REAL NOT NULL,
                    water_temp REAL NOT NULL
                );
                "#,
                [],
            )?;
            Ok::<_, StoreError>(())
        })
        .await??;

        debug!("Reading store ready at {}", path.display());
        Ok(Self { db_path: path })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }
}

fn parse_row(ts: String, ph: f64, tds: f64, temperature: f64) -> Result<Reading, StoreError> {
    let timestamp = NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT)
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {ts:?}: {e}")))?;
    Ok(Reading::new(timestamp, ph, tds, temperature))
}

#[async_trait]
impl ReadingStore for SqliteReadingStore {
    async fn insert(&self, reading: &Reading) -> Result<(), StoreError> {
        reading.validate()?;
        let reading = *reading;
        let path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = Connection::open(&path)?;
            conn.execute(
                UPSERT_SQL,
                params![
                    reading.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    reading.ph,
                    reading.tds,
                    reading.temperature
                ],
            )?;
            Ok::<_, StoreError>(())
        })
        .await?
    }

    async fn insert_many(&self, readings: &[Reading]) -> Result<usize, StoreError> {
        for reading in readings {
            reading.validate()?;
        }
        let readings = readings.to_vec();
        let path = self.db_path.clone();

        task::spawn_blocking(move || {
            let mut conn = Connection::open(&path)?;
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(UPSERT_SQL)?;
                for r in &readings {
                    stmt.execute(params![
                        r.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                        r.ph,
                        r.tds,
                        r.temperature
                    ])?;
                }
            }
            tx.commit()?;
            Ok::<_, StoreError>(readings.len())
        })
        .await?
    }

    async fn query_trailing(&self, k: usize) -> Result<Vec<Reading>, StoreError> {
        let path = self.db_path.clone();
        let limit = i64::try_from(k).unwrap_or(i64::MAX);

        task::spawn_blocking(move || {
            let conn = Connection::open(&path)?;
            let mut stmt = conn.prepare(
                "SELECT create_date, water_ph, tds, water_temp
                 FROM sensor_data
                 ORDER BY create_date DESC
                 LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })?;

            let mut readings = Vec::new();
            for row in rows {
                let (ts, ph, tds, temperature) = row?;
                readings.push(parse_row(ts, ph, tds, temperature)?);
            }
            readings.reverse();
            Ok::<_, StoreError>(readings)
        })
        .await?
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = Connection::open(&path)?;
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM sensor_data", [], |row| row.get(0))?;
            Ok::<_, StoreError>(count.max(0) as u64)
        })
        .await?
    }
}
