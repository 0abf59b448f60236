//! Historical Reading Store
//!
//! The forecast core never touches files; it reads history through
//! `ReadingStore::query_trailing` and the ingest paths write through
//! `insert`. One reading per hour slot: writing the same timestamp twice
//! keeps the later values.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::reading::{InvalidReading, Reading};

pub use memory::MemoryReadingStore;
pub use sqlite::SqliteReadingStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    InvalidReading(#[from] InvalidReading),
}

#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn insert(&self, reading: &Reading) -> Result<(), StoreError>;

    /// The `k` most recent readings, oldest first.
    async fn query_trailing(&self, k: usize) -> Result<Vec<Reading>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    /// Bulk insert; returns how many readings were written.
    async fn insert_many(&self, readings: &[Reading]) -> Result<usize, StoreError> {
        for reading in readings {
            self.insert(reading).await?;
        }
        Ok(readings.len())
    }

    async fn latest(&self) -> Result<Option<Reading>, StoreError> {
        Ok(self.query_trailing(1).await?.pop())
    }
}
