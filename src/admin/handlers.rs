use std::sync::atomic::Ordering;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::routing::router::RouteNode;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub total_requests: usize,
    pub debug: bool,
    pub root_built: bool,
    pub root_builds: usize,
    pub modules: usize,
}

#[derive(Debug, Serialize)]
pub struct ReloadResult {
    pub invalidated: bool,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let router = &state.router;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started.elapsed().as_secs(),
        total_requests: state.request_count.load(Ordering::Relaxed),
        debug: router.settings().debug,
        root_built: router.is_built(),
        root_builds: router.builds(),
        modules: router.registry().len(),
    })
}

pub async fn get_routes(
    State(state): State<AppState>,
) -> Result<Json<Vec<RouteNode>>, (StatusCode, String)> {
    let router = state.router.clone();
    // Building the tree may take table locks.
    let described = tokio::task::spawn_blocking(move || router.describe())
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    described.map(Json).map_err(|e| {
        tracing::error!(error = %e, "Failed to describe routes");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}

pub async fn post_reload(State(state): State<AppState>) -> Json<ReloadResult> {
    let invalidated = state.router.is_built();
    state.router.invalidate();
    tracing::info!(invalidated, "Root rule table reload requested");
    Json(ReloadResult { invalidated })
}
