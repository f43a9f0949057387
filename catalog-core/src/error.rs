use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Build a JSON error response with the standard
/// `{ "timestamp", "status", "error", "message" }` body.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "status": status.as_u16(),
        "error": status.canonical_reason().unwrap_or("Error"),
        "message": message.into(),
    });
    (status, Json(body)).into_response()
}

/// A field-level validation error.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

pub enum HttpError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
    Validation(Vec<FieldError>),
    Custom {
        status: StatusCode,
        body: serde_json::Value,
    },
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        match self {
            HttpError::Validation(errors) => {
                let fields: serde_json::Map<String, serde_json::Value> = errors
                    .into_iter()
                    .map(|e| (e.field, serde_json::Value::String(e.message)))
                    .collect();
                let body = serde_json::json!({
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "status": StatusCode::BAD_REQUEST.as_u16(),
                    "error": "Validation Failed",
                    "message": "Invalid input data",
                    "errors": fields,
                });
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            HttpError::Custom { status, body } => (status, Json(body)).into_response(),
            HttpError::NotFound(msg) => error_response(StatusCode::NOT_FOUND, msg),
            HttpError::BadRequest(msg) => error_response(StatusCode::BAD_REQUEST, msg),
            HttpError::Conflict(msg) => error_response(StatusCode::CONFLICT, msg),
            HttpError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("An unexpected error occurred: {msg}"),
                )
            }
        }
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            HttpError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            HttpError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            HttpError::Internal(msg) => write!(f, "Internal Error: {msg}"),
            HttpError::Validation(errors) => write!(f, "Validation Error: {} errors", errors.len()),
            HttpError::Custom { status, body } => write!(f, "Custom Error ({status}): {body}"),
        }
    }
}

impl std::fmt::Debug for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl std::error::Error for HttpError {}

impl From<garde::Report> for HttpError {
    fn from(report: garde::Report) -> Self {
        let errors = report
            .iter()
            .map(|(path, error)| {
                let field = path.to_string();
                FieldError {
                    field: if field.is_empty() { "value".to_string() } else { field },
                    message: error.message().to_string(),
                }
            })
            .collect();
        HttpError::Validation(errors)
    }
}
