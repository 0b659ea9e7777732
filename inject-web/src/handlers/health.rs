use axum::Json;
use serde_json::{json, Value};

/// 存活检查
/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
