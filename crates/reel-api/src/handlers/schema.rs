//! Timeline schema endpoint.

use axum::Json;
use serde_json::Value;

/// JSON Schema of the timeline document accepted by `/api/compile`.
pub async fn timeline_schema() -> Json<Value> {
    Json(reel_models::schema_json())
}
