//! HTTP route handlers.
//!
//! Every board endpoint computes arrivals from the current snapshot and
//! hands them to one formatter. Failures on the request path degrade to
//! empty-but-valid payloads; only malformed client input is a 4xx.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::arrivals::{Board, route_board};
use crate::render::{
    ActivatePayload, BusPayload, JsonRenderer, LaMetricRenderer, PollPayload, RenderArrivals,
    SpeechPayload, SpeechRenderer,
};
use crate::update::read_version;

use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/health", get(health))
        .route("/bus", get(bus))
        .route("/bus/speech", get(bus_speech))
        .route("/lametric", get(lametric))
        .route("/lametric/activate", get(lametric_activate).post(lametric_activate))
        .route("/admin/reload", post(reload))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Service metadata and snapshot row counts.
#[derive(Debug, Serialize)]
struct StatusPayload {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    dataset: DatasetInfo,
}

#[derive(Debug, Serialize)]
struct DatasetInfo {
    version: Option<String>,
    stops: usize,
    trips: usize,
    stop_times: usize,
    services: usize,
}

async fn status(State(state): State<AppState>) -> Json<StatusPayload> {
    let snapshot = state.snapshot.current().await;
    Json(StatusPayload {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        dataset: DatasetInfo {
            version: read_version(state.snapshot.dir()),
            stops: snapshot.stop_count(),
            trips: snapshot.trip_count(),
            stop_times: snapshot.stop_time_count(),
            services: snapshot.service_count(),
        },
    })
}

/// Query parameters shared by the board endpoints.
#[derive(Debug, Default, Deserialize)]
struct BoardQuery {
    /// Optional override for "now", `YYYY-MM-DDTHH:MM:SS` local time.
    /// Diagnostics aid; normal consumers omit it.
    at: Option<String>,
}

/// Raw arrivals as JSON.
async fn bus(
    State(state): State<AppState>,
    Query(query): Query<BoardQuery>,
) -> Result<Json<BusPayload>, AppError> {
    let board = board_at(&state, query.at.as_deref()).await?;
    Ok(Json(JsonRenderer.render(&board)))
}

/// Voice assistant payload: speech text plus display card.
async fn bus_speech(
    State(state): State<AppState>,
    Query(query): Query<BoardQuery>,
) -> Result<Json<SpeechPayload>, AppError> {
    let board = board_at(&state, query.at.as_deref()).await?;
    Ok(Json(SpeechRenderer.render(&board)))
}

/// LaMetric poll payload.
async fn lametric(
    State(state): State<AppState>,
    Query(query): Query<BoardQuery>,
) -> Result<Json<PollPayload>, AppError> {
    let board = board_at(&state, query.at.as_deref()).await?;
    Ok(Json(LaMetricRenderer.render(&board)))
}

/// LaMetric activate payload: frames plus the 5-minute revert instruction.
async fn lametric_activate(
    State(state): State<AppState>,
    Query(query): Query<BoardQuery>,
) -> Result<Json<ActivatePayload>, AppError> {
    let board = board_at(&state, query.at.as_deref()).await?;
    Ok(Json(LaMetricRenderer.render_activate(&board)))
}

/// Re-read the dataset directory and publish the new snapshot.
///
/// The refresh job swaps the on-disk dataset; calling this afterwards
/// picks it up without a restart.
async fn reload(State(state): State<AppState>) -> Result<Json<StatusPayload>, AppError> {
    state.snapshot.reload().await.map_err(|e| AppError::Internal {
        message: format!("reload failed: {e}"),
    })?;
    Ok(status(State(state)).await)
}

/// Compute the board at the requested instant, defaulting to now.
async fn board_at(state: &AppState, at: Option<&str>) -> Result<Board, AppError> {
    let now = match at {
        Some(s) => parse_at(s)?,
        None => Local::now().naive_local(),
    };
    let snapshot = state.snapshot.current().await;
    Ok(route_board(&snapshot, &state.config, now))
}

fn parse_at(s: &str) -> Result<NaiveDateTime, AppError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").map_err(|_| AppError::BadRequest {
        message: format!("invalid at parameter: {s:?} (expected YYYY-MM-DDTHH:MM:SS)"),
    })
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    Internal { message: String },
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        warn!(%status, "{message}");

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
