use std::sync::Arc;

use shuttle_axum::axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::controller::{RunController, RunOutcome, RunRequest, RunSnapshot};
use crate::error::ErrorKind;
use crate::last_search::LastSearch;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<RunController>,
}

impl AppState {
    pub fn new(controller: Arc<RunController>) -> Self {
        Self { controller }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/runs", post(start_run))
        .route("/runs/cancel", post(cancel_run))
        .route("/runs/state", get(run_state))
        .route("/cache", get(cache_info).delete(clear_cache))
        .route("/last-search", get(last_search))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn outcome_status(outcome: &RunOutcome) -> StatusCode {
    match outcome {
        RunOutcome::Completed { .. } | RunOutcome::Empty { .. } => StatusCode::OK,
        RunOutcome::Cancelled => StatusCode::CONFLICT,
        RunOutcome::Failed { kind, .. } => match kind {
            ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Cancelled => StatusCode::CONFLICT,
            ErrorKind::Network | ErrorKind::Http | ErrorKind::Decode => StatusCode::BAD_GATEWAY,
        },
    }
}

async fn start_run(State(state): State<AppState>, Json(req): Json<RunRequest>) -> Response {
    let outcome = state.controller.start_run(req).await;
    (outcome_status(&outcome), Json(outcome)).into_response()
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelResp {
    cancelled: bool,
}

async fn cancel_run(State(state): State<AppState>) -> Json<CancelResp> {
    Json(CancelResp {
        cancelled: state.controller.cancel_run(),
    })
}

async fn run_state(State(state): State<AppState>) -> Json<RunSnapshot> {
    Json(state.controller.snapshot())
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheInfo {
    entries: usize,
}

async fn cache_info(State(state): State<AppState>) -> Json<CacheInfo> {
    Json(CacheInfo {
        entries: state.controller.cached_entries(),
    })
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheCleared {
    removed: usize,
}

async fn clear_cache(State(state): State<AppState>) -> Json<CacheCleared> {
    Json(CacheCleared {
        removed: state.controller.clear_cache(),
    })
}

async fn last_search(State(state): State<AppState>) -> Json<Option<LastSearch>> {
    Json(state.controller.last_search())
}
