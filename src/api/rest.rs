// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. The presentation layer reads the
// dashboard snapshot from here, changes the scenario/region selection, and
// pulls the export document.
//
// Selection keys are validated at this edge: an unknown scenario or region is
// rejected with 400 and the current selection is left untouched.
//
// CORS allows any origin: the dashboard is served from a separate host.
// =============================================================================

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::projection::ProjectionResult;
use crate::scenario_table;
use crate::types::{Region, Scenario, Selection};

/// File name the export document is offered under.
pub const EXPORT_FILENAME: &str = "HoneyCoin_Investor_Deck_2026-2028.json";

type ApiError = (StatusCode, Json<serde_json::Value>);

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/signal", get(signal))
        .route("/api/v1/catalog", get(catalog))
        .route("/api/v1/projection", get(projection))
        .route("/api/v1/selection", post(set_selection))
        .route("/api/v1/export", get(export))
        // ── WebSocket (handled separately in ws module but mounted here) ─
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

fn bad_request(message: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
}

/// Parse an optional wire key, mapping an unknown value to a 400.
fn parse_key<T>(raw: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: FromStr<Err = anyhow::Error>,
{
    raw.map(str::parse::<T>)
        .transpose()
        .map_err(|e| bad_request(e.to_string()))
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Snapshot / signal / catalog
// =============================================================================

async fn full_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

async fn signal(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.current_signal())
}

async fn catalog() -> impl IntoResponse {
    Json(scenario_table::catalog())
}

// =============================================================================
// Projection (read-only, does not change the selection)
// =============================================================================

#[derive(Deserialize)]
struct ProjectionQuery {
    scenario: Option<String>,
    region: Option<String>,
}

async fn projection(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProjectionQuery>,
) -> Result<Json<ProjectionResult>, ApiError> {
    let sel = state.current_selection();
    let scenario = parse_key::<Scenario>(query.scenario.as_deref())?.unwrap_or(sel.scenario);
    let region = parse_key::<Region>(query.region.as_deref())?.unwrap_or(sel.region);
    Ok(Json(state.project(scenario, region)))
}

// =============================================================================
// Selection
// =============================================================================

#[derive(Deserialize)]
struct SelectionRequest {
    #[serde(default)]
    scenario: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

#[derive(Serialize)]
struct SelectionResponse {
    selection: Selection,
    projection: ProjectionResult,
}

async fn set_selection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SelectionRequest>,
) -> Result<Json<SelectionResponse>, ApiError> {
    // Validate both keys before touching state so a bad region cannot leave
    // a half-applied scenario change behind.
    let scenario = parse_key::<Scenario>(req.scenario.as_deref()).inspect_err(|_| {
        warn!(scenario = ?req.scenario, "rejected selection with unknown scenario");
    })?;
    let region = parse_key::<Region>(req.region.as_deref()).inspect_err(|_| {
        warn!(region = ?req.region, "rejected selection with unknown region");
    })?;

    let selection = state.select(scenario, region);
    Ok(Json(SelectionResponse {
        selection,
        projection: state.project(selection.scenario, selection.region),
    }))
}

// =============================================================================
// Export
// =============================================================================

async fn export(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.build_snapshot();
    info!(
        state_version = snapshot.state_version,
        scenario = %snapshot.selection.scenario,
        region = %snapshot.selection.region,
        "dashboard export requested"
    );
    (
        [(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{EXPORT_FILENAME}\""),
        )],
        Json(snapshot),
    )
}
