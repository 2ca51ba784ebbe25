//! Tool manifest and invocation over HTTP.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use foldrun_core::FoldError;
use serde_json::Value;

use crate::state::SharedState;

pub async fn api_tools(State(state): State<SharedState>) -> Json<Value> {
    Json(state.registry.manifest())
}

pub async fn api_tool_invoke(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(params): Json<Value>,
) -> Response {
    if state.registry.get(&name).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "status": "error", "error": format!("Unknown tool: {name}") })),
        )
            .into_response();
    }

    match state.registry.invoke(&name, params).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            let status = status_for(&e);
            tracing::warn!(tool = %name, status = status.as_u16(), error = %e, "Tool failed");
            (
                status,
                Json(serde_json::json!({ "status": "error", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// HTTP status for a failed tool call.
pub fn status_for(err: &anyhow::Error) -> StatusCode {
    match err.downcast_ref::<FoldError>() {
        Some(FoldError::InputNotFound(_)) => StatusCode::NOT_FOUND,
        Some(FoldError::InvalidInput(_) | FoldError::InvalidConfig(_)) => StatusCode::BAD_REQUEST,
        Some(FoldError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        Some(FoldError::Inference(_) | FoldError::Download { .. } | FoldError::Http(_)) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
