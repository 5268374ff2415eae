//! 健康检查与运行指标

use crate::AppState;
use crate::middleware::require_auth_session;
use api_contract::ApiResponse;
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

/// 进程内计数器快照，需要登录。
pub async fn get_metrics(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = require_auth_session(&state, &headers) {
        return response;
    }
    let snapshot = conduit_telemetry::metrics().snapshot();
    (StatusCode::OK, Json(ApiResponse::success(snapshot))).into_response()
}
