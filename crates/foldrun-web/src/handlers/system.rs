//! Liveness check.

use axum::extract::State;
use axum::Json;
use serde_json::Value;

use crate::state::SharedState;

pub async fn health(State(state): State<SharedState>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "tools": state.registry.len(),
        "subscribers": state.event_tx.receiver_count(),
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}
