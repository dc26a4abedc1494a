use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::db::record_id::RecordId;
use crate::store::{ConfigUpdate, NewConfig, TafsiriConfig};
use crate::web::error::ApiError;
use crate::web::state::AppState;

pub async fn create_config(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewConfig>,
) -> Result<(StatusCode, Json<TafsiriConfig>), ApiError> {
    let config = state.configs.create(payload).await?;
    Ok((StatusCode::CREATED, Json(config)))
}

pub async fn list_configs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TafsiriConfig>>, ApiError> {
    Ok(Json(state.configs.list().await?))
}

pub async fn get_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TafsiriConfig>, ApiError> {
    let id = RecordId::parse(&id)?;
    Ok(Json(state.configs.get(id).await?))
}

pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<ConfigUpdate>,
) -> Result<Json<TafsiriConfig>, ApiError> {
    let id = RecordId::parse(&id)?;
    Ok(Json(state.configs.update(id, payload).await?))
}

pub async fn delete_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = RecordId::parse(&id)?;
    state.configs.delete(id).await?;
    Ok(Json(json!({ "success": true })))
}
