use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use catalog_core::HttpError;
use serde::Deserialize;

use crate::models::{Page, Pageable, ProductRequest, ProductResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub page: Option<u64>,
    pub size: Option<u64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(search).post(create))
        .route("/api/products/{id}", get(find).put(update).delete(remove))
}

fn body(payload: Result<Json<ProductRequest>, JsonRejection>) -> Result<ProductRequest, HttpError> {
    payload
        .map(|Json(req)| req)
        .map_err(|rejection| HttpError::BadRequest(rejection.body_text()))
}

fn product_id(id: Result<Path<u64>, PathRejection>) -> Result<u64, HttpError> {
    id.map(|Path(id)| id)
        .map_err(|rejection| HttpError::BadRequest(rejection.body_text()))
}

async fn create(
    State(state): State<AppState>,
    payload: Result<Json<ProductRequest>, JsonRejection>,
) -> Result<Json<ProductResponse>, HttpError> {
    let product = state.products.create(body(payload)?).await?;
    Ok(Json(product))
}

async fn find(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<ProductResponse>, HttpError> {
    Ok(Json(state.products.find_by_id(product_id(id)?).await?))
}

async fn search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Page<ProductResponse>>, HttpError> {
    let Query(params) = params.map_err(|rejection| HttpError::BadRequest(rejection.body_text()))?;
    let defaults = Pageable::default();
    let pageable = Pageable::new(
        params.page.unwrap_or(defaults.page),
        params.size.unwrap_or(defaults.size),
    );
    Ok(Json(state.products.search(params.q.as_deref(), pageable).await?))
}

async fn update(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
    payload: Result<Json<ProductRequest>, JsonRejection>,
) -> Result<Json<ProductResponse>, HttpError> {
    Ok(Json(state.products.update(product_id(id)?, body(payload)?).await?))
}

async fn remove(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<StatusCode, HttpError> {
    state.products.delete(product_id(id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
