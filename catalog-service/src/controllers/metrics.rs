use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use catalog_core::HttpError;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics))
}

/// Prometheus text exposition of everything published so far.
async fn metrics(State(state): State<AppState>) -> Result<Response, HttpError> {
    let backend = state
        .prometheus
        .as_ref()
        .ok_or_else(|| HttpError::NotFound("Prometheus metrics are not enabled".into()))?;
    let body = backend
        .encode()
        .map_err(|e| HttpError::Internal(e.to_string()))?;
    Ok(([(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")], body).into_response())
}
