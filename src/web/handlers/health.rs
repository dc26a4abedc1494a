use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::web::error::ApiError;
use crate::web::state::AppState;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub config_count: usize,
    pub response_count: usize,
}

pub async fn healthchecker() -> Json<Value> {
    Json(json!({ "message": "Welcome to Tafsiri, we are up and running" }))
}

pub async fn system_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SystemStatus>, ApiError> {
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds();

    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        config_count: state.configs.count().await?,
        response_count: state.metrics.count().await?,
    }))
}
