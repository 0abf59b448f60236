//! Seed the reading store from a cleaned sensor CSV export.
//!
//! Usage: import_history <dataset.csv> [db path]

use std::env;

use anyhow::{Context, Result};
use tracing::{info, warn};

use aqua_forecast::config::ServiceConfig;
use aqua_forecast::dataset::load_history_csv;
use aqua_forecast::utils::telemetry::{init_tracing, DEFAULT_FILTER};
use aqua_forecast::{ReadingStore, SqliteReadingStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing(DEFAULT_FILTER);

    let mut args = env::args().skip(1);
    let Some(csv_path) = args.next() else {
        anyhow::bail!("usage: import_history <dataset.csv> [db path]");
    };
    let db_path = match args.next() {
        Some(path) => path.into(),
        None => ServiceConfig::from_env()?.db_path,
    };

    info!("Reading dataset {}...", csv_path);
    let loaded = load_history_csv(&csv_path).with_context(|| format!("failed to load {csv_path}"))?;
    if loaded.skipped > 0 {
        warn!("Skipped {} incomplete rows", loaded.skipped);
    }
    if loaded.readings.is_empty() {
        anyhow::bail!("{} contains no usable readings", csv_path);
    }

    let store = SqliteReadingStore::new(&db_path).await?;
    let written = store.insert_many(&loaded.readings).await?;
    let total = store.count().await?;

    info!(
        "✅ Imported {} readings into {} ({} stored in total)",
        written,
        db_path.display(),
        total
    );
    Ok(())
}
