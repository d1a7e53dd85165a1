//! HTTP handlers, one module per area of the API.
//!
//! Every response body is a JSON object with a single envelope key.

use crate::error::AppError;
use axum::Json;
use serde_json::{Value, json};

pub mod academic;
pub mod classes;
pub mod groups;
pub mod journals;
pub mod logs;
pub mod marks;
pub mod sessions;
pub mod students;
pub mod taxonomy;
pub mod users;

pub type ApiResult = Result<Json<Value>, AppError>;

/// # GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "available" }))
}

pub(crate) fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}
