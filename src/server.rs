use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::dataset::parse_timestamp;
use crate::error::ForecastError;
use crate::forecast::{round2, Forecast, ForecastRecord, Forecaster};
use crate::reading::Reading;
use crate::simulate::trigger_ranges;
use crate::store::{ReadingStore, StoreError};
use crate::utils::next_hour_slot;

pub const PERSISTENCE_HEADER: &str = "x-persistence";

#[derive(Debug)]
pub enum ServerError {
    Forecast(ForecastError),
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            ServerError::Forecast(e) => match e {
                ForecastError::Precondition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ForecastError::InvalidHorizon { .. } => StatusCode::BAD_REQUEST,
                // Stored history is never client input.
                ForecastError::InvalidHistory(_) | ForecastError::Predictor { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                ForecastError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ServerError::Forecast(e) => e.kind(),
            ServerError::BadRequest(_) => "bad_request",
            ServerError::NotFound(_) => "not_found",
            ServerError::Internal(_) => "internal",
        }
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Forecast(e) => write!(f, "{e}"),
            ServerError::BadRequest(msg) | ServerError::NotFound(msg) => f.write_str(msg),
            ServerError::Internal(e) => write!(f, "{e:#}"),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind(), "Request failed: {}", self);
        } else {
            warn!(kind = self.kind(), "Request rejected: {}", self);
        }
        let body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
            "kind": self.kind(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<ForecastError> for ServerError {
    fn from(err: ForecastError) -> Self {
        Self::Forecast(err)
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidReading(e) => Self::BadRequest(e.to_string()),
            other => Self::Forecast(ForecastError::StoreUnavailable(other)),
        }
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(err.into())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReadingStore>,
    pub forecaster: Arc<Forecaster>,
    /// Last successful forecast, replaced whole on each run.
    pub last_forecast: Arc<RwLock<Option<Arc<Forecast>>>>,
    pub simulate_input: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn ReadingStore>, forecaster: Arc<Forecaster>, simulate_input: bool) -> Self {
        Self {
            store,
            forecaster,
            last_forecast: Arc::new(RwLock::new(None)),
            simulate_input,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IngestRequest {
    ph: f64,
    tds: f64,
    suhu: f64,
    #[serde(default)]
    waktu: Option<String>,
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    success: bool,
    message: String,
}

#[derive(Debug, Serialize)]
struct LatestReading {
    ph: f64,
    tds: f64,
    suhu: f64,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    readings: Option<u64>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/latest", get(latest_handler))
        .route("/api/predictions", get(predictions_handler))
        .route("/api/predict", post(predict_handler))
        .route("/api/readings", post(ingest_handler))
        .route("/api/post", post(ingest_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(state: AppState, addr: SocketAddr) -> Result<()> {
    let app = router(state);

    info!("🌊 Forecast service listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Forecast service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, readings) = match state.store.count().await {
        Ok(n) => ("ok", Some(n)),
        Err(e) => {
            warn!("Health check could not reach the store: {}", e);
            ("degraded", None)
        }
    };
    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        readings,
    })
}

async fn latest_handler(State(state): State<AppState>) -> Result<Json<LatestReading>, ServerError> {
    let reading = state
        .store
        .latest()
        .await?
        .ok_or_else(|| ServerError::NotFound("no readings stored yet".into()))?;

    Ok(Json(LatestReading {
        ph: round2(reading.ph),
        tds: round2(reading.tds),
        suhu: round2(reading.temperature),
    }))
}

async fn predictions_handler(State(state): State<AppState>) -> Json<Vec<ForecastRecord>> {
    let cached = state.last_forecast.read().await;
    Json(cached.as_ref().map(|f| f.records.clone()).unwrap_or_default())
}

async fn predict_handler(State(state): State<AppState>) -> Result<Response, ServerError> {
    let mut unsaved: Option<Reading> = None;

    if state.simulate_input {
        let slot = next_hour_slot(Local::now().naive_local());
        let reading = trigger_ranges().sample(&mut rand::thread_rng(), slot);
        info!(timestamp = %reading.timestamp, "Recording simulated input reading");
        if let Err(e) = state.store.insert(&reading).await {
            warn!("Simulated reading was not persisted: {}", e);
            unsaved = Some(reading);
        }
    }

    let context = state.forecaster.settings().context_hours;
    let mut history = state.store.query_trailing(context).await?;
    if let Some(reading) = unsaved {
        history.retain(|r| r.timestamp != reading.timestamp);
        history.push(reading);
    }

    let forecaster = state.forecaster.clone();
    let forecast = tokio::task::spawn_blocking(move || forecaster.run(history)).await??;
    let forecast = Arc::new(forecast);
    *state.last_forecast.write().await = Some(forecast.clone());

    let mut response = Json(forecast.records.clone()).into_response();
    if unsaved.is_some() {
        response
            .headers_mut()
            .insert(PERSISTENCE_HEADER, HeaderValue::from_static("degraded"));
    }
    Ok(response)
}

async fn ingest_handler(
    State(state): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestResponse>, ServerError> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    let timestamp = match req.waktu.as_deref() {
        Some(raw) => parse_timestamp(raw).ok_or_else(|| ServerError::BadRequest(format!("unrecognised timestamp {raw:?}")))?,
        None => next_hour_slot(Local::now().naive_local()),
    };
    let reading = Reading::new(timestamp, req.ph, req.tds, req.suhu);
    reading.validate().map_err(|e| ServerError::BadRequest(e.to_string()))?;

    state.store.insert(&reading).await?;
    info!(timestamp = %reading.timestamp, "Stored reading");

    Ok(Json(IngestResponse {
        success: true,
        message: format!("reading stored for {}", reading.timestamp.format(crate::reading::TIMESTAMP_FORMAT)),
    }))
}
