use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

// Config management - CRUD over tenant configurations
pub fn config_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api/config",
        Router::new()
            .route("/new_config", post(handlers::config::create_config))
            .route("/get_configs", get(handlers::config::list_configs))
            .route("/get_config/{id}", get(handlers::config::get_config))
            .route("/update_config/{id}", put(handlers::config::update_config))
            .route("/delete_config/{id}", delete(handlers::config::delete_config)),
    )
}

// Question answering and response feedback
pub fn tafsiri_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api/tafsiri",
        Router::new()
            .route("/question", post(handlers::tafsiri::ask_question))
            .route("/rate/{response_id}", post(handlers::tafsiri::rate_response))
            .route("/responses/{response_id}", get(handlers::tafsiri::get_response))
            .route(
                "/table_descriptions/{config_id}",
                get(handlers::tafsiri::table_descriptions),
            ),
    )
}

pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/healthchecker", get(handlers::health::healthchecker))
        .route("/api/status", get(handlers::health::system_status))
}

/// Full application router with CORS, tracing and compression applied.
pub fn build(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(config_routes())
        .merge(tafsiri_routes())
        .merge(health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::state::test_support::app_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_config(app: &Router) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/api/config/new_config",
            Some(json!({
                "config_name": "NDWH",
                "tables": ["LinelistHEI"],
                "example_prompt": "Count rows with COUNT(*)",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn config_lifecycle() {
        let app = build(app_state("SELECT 1"));
        let id = create_config(&app).await;

        let (status, body) = call(&app, "GET", &format!("/api/config/get_config/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["config_name"], "NDWH");
        assert_eq!(body["tables"], json!(["LinelistHEI"]));

        let (status, body) = call(
            &app,
            "PUT",
            &format!("/api/config/update_config/{}", id),
            Some(json!({ "config_name": "NDWH v2" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["config_name"], "NDWH v2");
        assert_eq!(body["example_prompt"], "Count rows with COUNT(*)");

        let (_, body) = call(&app, "GET", "/api/config/get_configs", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = call(&app, "DELETE", &format!("/api/config/delete_config/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));

        let (status, _) = call(&app, "GET", &format!("/api/config/get_config/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_ids_are_rejected_before_lookup() {
        let app = build(app_state("SELECT 1"));

        let (status, body) = call(&app, "GET", "/api/config/get_config/not-an-id", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("not-an-id"));

        let (status, _) = call(&app, "DELETE", "/api/config/delete_config/xyz", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn blank_config_name_is_a_bad_request() {
        let app = build(app_state("SELECT 1"));
        let (status, body) = call(
            &app,
            "POST",
            "/api/config/new_config",
            Some(json!({ "config_name": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn question_then_rate_then_fetch_response() {
        let app = build(app_state("SELECT County, Infants FROM LinelistHEI ORDER BY County"));
        let config_id = create_config(&app).await;

        let (status, answer) = call(
            &app,
            "POST",
            "/api/tafsiri/question",
            Some(json!({
                "question": "How many HEI infants per county?",
                "user_id": "analyst",
                "config_id": config_id,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(answer["data"][0], json!({ "County": "Kisumu", "Infants": 7 }));
        let response_id = answer["saved_response_id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/tafsiri/rate/{}", response_id),
            Some(json!({ "response_rating": 4, "response_rating_comment": "close enough" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));

        let (status, record) = call(&app, "GET", &format!("/api/tafsiri/responses/{}", response_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["is_valid"], true);
        assert_eq!(record["response_rating"], 4);
        assert_eq!(record["created_by"], "analyst");
    }

    #[tokio::test]
    async fn pipeline_failure_is_a_bad_gateway_with_the_saved_id() {
        let app = build(app_state("SELECT missing FROM LinelistHEI"));
        let config_id = create_config(&app).await;

        let (status, body) = call(
            &app,
            "POST",
            "/api/tafsiri/question",
            Some(json!({ "question": "How many infants?", "config_id": config_id })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["sql_query"], "SELECT missing FROM LinelistHEI");

        let response_id = body["saved_response_id"].as_str().unwrap();
        let (_, record) = call(&app, "GET", &format!("/api/tafsiri/responses/{}", response_id), None).await;
        assert_eq!(record["is_valid"], false);
        assert_eq!(record["time_taken_secs"], 0.0);
    }

    #[tokio::test]
    async fn rating_an_unknown_response_is_not_found() {
        let app = build(app_state("SELECT 1"));
        let (status, _) = call(
            &app,
            "POST",
            "/api/tafsiri/rate/0123456789abcdef0123456789abcdef",
            Some(json!({ "response_rating": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn table_descriptions_list_configured_tables() {
        let app = build(app_state("SELECT 1"));
        let config_id = create_config(&app).await;

        let (status, body) = call(
            &app,
            "GET",
            &format!("/api/tafsiri/table_descriptions/{}", config_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tables"][0]["table_name"], "LinelistHEI");
    }

    #[tokio::test]
    async fn status_counts_configs_and_responses() {
        let app = build(app_state("SELECT 1"));
        create_config(&app).await;

        let (status, body) = call(&app, "GET", "/api/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["config_count"], 1);
        assert_eq!(body["response_count"], 0);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let app = build(app_state("SELECT 1"));
        let request = Request::builder()
            .uri("/api/healthchecker")
            .header("origin", "https://dashboards.example.org")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }
}
