use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::db::record_id::RecordId;
use crate::query::QueryOutcome;
use crate::store::QueryResponse;
use crate::web::error::ApiError;
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub config_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub response_rating: i32,
    #[serde(default)]
    pub response_rating_comment: Option<String>,
}

pub async fn ask_question(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<QueryOutcome>, ApiError> {
    info!("Received question for config {}", request.config_id);
    let outcome = state
        .orchestrator
        .answer(&request.question, request.user_id.as_deref(), &request.config_id)
        .await?;
    Ok(Json(outcome))
}

pub async fn rate_response(
    State(state): State<Arc<AppState>>,
    Path(response_id): Path<String>,
    Json(rating): Json<RateRequest>,
) -> Result<Json<Value>, ApiError> {
    let id = RecordId::parse(&response_id)?;
    state
        .metrics
        .update_rating(id, rating.response_rating, rating.response_rating_comment)
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn get_response(
    State(state): State<Arc<AppState>>,
    Path(response_id): Path<String>,
) -> Result<Json<QueryResponse>, ApiError> {
    let id = RecordId::parse(&response_id)?;
    Ok(Json(state.metrics.get(id).await?))
}

pub async fn table_descriptions(
    State(state): State<Arc<AppState>>,
    Path(config_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let tables = state.orchestrator.describe_tables(&config_id).await?;
    Ok(Json(json!({ "tables": tables })))
}
