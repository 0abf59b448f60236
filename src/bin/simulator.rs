//! Post random sensor readings to a running service at a fixed interval.
//!
//! Environment: `AQUA_SIMULATOR_URL` (default http://127.0.0.1:5000/api/post),
//! `AQUA_SIMULATOR_INTERVAL_SECS` (default 3600). The service assigns each
//! reading to the next hour slot.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{info, warn};

use aqua_forecast::simulate::sensor_ranges;
use aqua_forecast::utils::telemetry::{init_tracing, DEFAULT_FILTER};

const DEFAULT_URL: &str = "http://127.0.0.1:5000/api/post";
const DEFAULT_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing(DEFAULT_FILTER);

    let url = env::var("AQUA_SIMULATOR_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let interval_secs = match env::var("AQUA_SIMULATOR_INTERVAL_SECS") {
        Ok(v) => v
            .parse::<u64>()
            .with_context(|| format!("AQUA_SIMULATOR_INTERVAL_SECS must be a number of seconds, got {v:?}"))?,
        Err(_) => DEFAULT_INTERVAL_SECS,
    };

    let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
    let ranges = sensor_ranges();
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    info!("📡 Posting simulated readings to {} every {}s", url, interval_secs);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Simulator stopped");
                return Ok(());
            }
        }

        // Timestamp is ignored; the service picks the slot.
        let reading = ranges.sample(&mut rand::thread_rng(), chrono::Local::now().naive_local());
        let body = json!({
            "ph": reading.ph,
            "tds": reading.tds,
            "suhu": reading.temperature,
        });

        match client.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(ph = reading.ph, tds = reading.tds, suhu = reading.temperature, "Reading sent");
            }
            Ok(resp) => warn!("Service rejected reading: HTTP {}", resp.status()),
            Err(e) => warn!("Failed to send reading: {}", e),
        }
    }
}
