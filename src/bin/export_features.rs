//! Write the training feature table for a sensor CSV export.
//!
//! Usage: export_features <dataset.csv> <features.csv>

use std::env;
use std::fs::File;
use std::io::BufWriter;

use anyhow::{Context, Result};
use tracing::info;

use aqua_forecast::dataset::{load_history_csv, write_feature_csv};
use aqua_forecast::features::derive_features;
use aqua_forecast::utils::telemetry::{init_tracing, DEFAULT_FILTER};

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing(DEFAULT_FILTER);

    let args: Vec<String> = env::args().skip(1).collect();
    let [input, output] = args.as_slice() else {
        anyhow::bail!("usage: export_features <dataset.csv> <features.csv>");
    };

    let loaded = load_history_csv(input).with_context(|| format!("failed to load {input}"))?;
    info!("Loaded {} readings ({} skipped)", loaded.readings.len(), loaded.skipped);

    let table = derive_features(&loaded.readings);
    let file = File::create(output).with_context(|| format!("failed to create {output}"))?;
    let written = write_feature_csv(BufWriter::new(file), &table)?;

    info!(
        "✅ Wrote {} complete feature rows to {} ({} dropped for missing lags)",
        written,
        output,
        table.len() - written
    );
    Ok(())
}
