//! Maps domain failures onto HTTP responses with a JSON `{"error": ...}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::db::record_id::{InvalidRecordId, RecordId};
use crate::query::QueryError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    InvalidId(#[from] InvalidRecordId),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Metadata service, LLM or reporting database failed.
    #[error("{message}")]
    Upstream {
        message: String,
        sql_query: Option<String>,
        saved_response_id: Option<RecordId>,
    },

    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::Validation(message) => ApiError::Validation(message),
            StoreError::Corrupt(_) | StoreError::Unavailable(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidId(e) => ApiError::InvalidId(e),
            QueryError::Validation(message) => ApiError::Validation(message),
            QueryError::Store(e) => e.into(),
            QueryError::Metadata(e) => ApiError::Upstream {
                message: e.to_string(),
                sql_query: None,
                saved_response_id: None,
            },
            QueryError::Pipeline {
                source,
                sql_query,
                saved_response_id,
            } => ApiError::Upstream {
                message: source.to_string(),
                sql_query,
                saved_response_id: Some(saved_response_id),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidId(e) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
            }
            ApiError::Validation(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Upstream {
                message,
                sql_query,
                saved_response_id,
            } => (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": message,
                    "sql_query": sql_query,
                    "saved_response_id": saved_response_id,
                })),
            )
                .into_response(),
            ApiError::Internal(detail) => {
                // detail may carry SQL or file paths; keep it in the logs only
                error!("Internal server error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_client_and_server_statuses() {
        let id = RecordId::generate();
        let not_found: ApiError = StoreError::NotFound { kind: "config", id }.into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let invalid: ApiError = StoreError::Validation("config_name must not be empty".into()).into();
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);

        let down: ApiError = StoreError::Unavailable("pool timed out".into()).into();
        assert_eq!(down.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn malformed_ids_are_bad_requests() {
        let err: ApiError = RecordId::parse("nope").unwrap_err().into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
