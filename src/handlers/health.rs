//! Liveness endpoint.

use axum::Json;
use serde_json::{json, Value};

use crate::http::request::Exchange;

/// `GET /`: reports the process is serving. Never touches the store.
pub async fn liveness(_exchange: Exchange) -> Json<Value> {
    Json(json!({ "status": "OK" }))
}
