use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn config(State(state): State<AppState>) -> Json<Value> {
    Json(state.config_view.as_ref().clone())
}

/// The marker written by the last completed update pass; `null` before the
/// first one.
pub async fn metadata(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "last_update": state.snapshots.latest().await }))
}
