//! Water-quality forecasting service
//!
//! Loads the exported forest models, opens the historical reading store and
//! serves the HTTP API.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use aqua_forecast::config::ServiceConfig;
use aqua_forecast::server::{run_server, AppState};
use aqua_forecast::utils::telemetry::{init_tracing, DEFAULT_FILTER};
use aqua_forecast::{Forecaster, ModelSet, ReadingStore, SqliteReadingStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();
    init_tracing(DEFAULT_FILTER);

    let config = ServiceConfig::from_env().context("invalid service configuration")?;
    info!(
        db = %config.db_path.display(),
        models = %config.model_dir.display(),
        horizon = config.forecast.horizon,
        context_hours = config.forecast.context_hours,
        "Starting forecast service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let models = ModelSet::load(&config.model_dir)
        .with_context(|| format!("failed to load models from {}", config.model_dir.display()))?;

    let store = SqliteReadingStore::new(&config.db_path)
        .await
        .with_context(|| format!("failed to open reading store {}", config.db_path.display()))?;
    let stored = store.count().await.unwrap_or(0);
    info!("💾 Reading store holds {} readings", stored);

    let state = AppState::new(
        Arc::new(store),
        Arc::new(Forecaster::new(models, config.forecast)),
        config.simulate_input,
    );

    run_server(state, config.bind_addr).await
}
