use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use catalog_metrics::{StandardUnit, HEALTH_CHECK};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(|| async { "Ready" }))
        .route("/health/live", get(|| async { "Live" }))
        .route("/actuator/health", get(|| async { Json(json!({ "status": "UP" })) }))
        .route("/actuator/info", get(info))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    state.sink.publish(HEALTH_CHECK, 1.0, StandardUnit::Count);
    Json(json!({
        "status": "UP",
        "timestamp": chrono::Utc::now().timestamp_millis(),
    }))
}

async fn info() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
