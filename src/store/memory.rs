//! In-process reading store, keyed by timestamp.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::RwLock;

use super::{ReadingStore, StoreError};
use crate::reading::Reading;

#[derive(Default)]
pub struct MemoryReadingStore {
    rows: RwLock<BTreeMap<NaiveDateTime, Reading>>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_readings(readings: impl IntoIterator<Item = Reading>) -> Self {
        let rows = readings.into_iter().map(|r| (r.timestamp, r)).collect();
        Self {
            rows: RwLock::new(rows),
        }
    }
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn insert(&self, reading: &Reading) -> Result<(), StoreError> {
        reading.validate()?;
        self.rows.write().await.insert(reading.timestamp, *reading);
        Ok(())
    }

    async fn query_trailing(&self, k: usize) -> Result<Vec<Reading>, StoreError> {
        let rows = self.rows.read().await;
        let mut out: Vec<Reading> = rows.values().rev().take(k).copied().collect();
        out.reverse();
        Ok(out)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.rows.read().await.len() as u64)
    }
}
