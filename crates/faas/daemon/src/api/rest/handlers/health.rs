//! Health handler

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{extract::State, Json};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
    pub functions: usize,
    pub units: usize,
    pub queued: usize,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthCheckResponse>> {
    let functions = state.store.list_functions(None).await?.len();
    let units = state.store.list_all_units().await?.len();

    Ok(Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
        functions,
        units,
        queued: state.scheduler.queue().len().await,
    }))
}
