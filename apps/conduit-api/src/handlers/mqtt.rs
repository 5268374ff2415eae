//! broker HTTP 钩子
//!
//! - POST /mqtt/auth - 连接鉴权
//! - POST /mqtt/acl - 发布/订阅授权
//! - POST /mqtt/events - 会话事件通知
//!
//! 钩子由 broker 在内网调用，不校验 Bearer token。

use crate::AppState;
use crate::utils::response::{bad_request_error, session_error};
use api_contract::{HookResult, MqttAclRequest, MqttAuthRequest, MqttEventRequest};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use conduit_mqtt::SessionError;
use domain::ClientSession;
use tracing::warn;

/// 连接鉴权
pub async fn mqtt_auth(State(state): State<AppState>, Json(req): Json<MqttAuthRequest>) -> Response {
    let session = ClientSession::new(req.client_id, req.username, req.password.into_bytes());
    let result = state.sessions.auth_connect(Some(&session)).await;
    hook_result(result, &session.id, "connect")
}

/// 发布/订阅授权
pub async fn mqtt_acl(State(state): State<AppState>, Json(req): Json<MqttAclRequest>) -> Response {
    let session = ClientSession::new(req.client_id, req.username, Vec::new());
    let result = match req.action.trim() {
        "publish" => {
            state
                .sessions
                .auth_publish(Some(&session), Some(req.topic.as_str()), &[])
                .await
        }
        "subscribe" => {
            let topics = [req.topic];
            state
                .sessions
                .auth_subscribe(Some(&session), Some(topics.as_slice()))
                .await
        }
        other => return bad_request_error(format!("unsupported action: {other}")),
    };
    hook_result(result, &session.id, "acl")
}

/// 会话事件通知
///
/// 事件已在 broker 生效，会话回调只记录日志，已知事件一律返回 204。
pub async fn mqtt_events(
    State(state): State<AppState>,
    Json(req): Json<MqttEventRequest>,
) -> Response {
    let session = ClientSession::new(req.client_id, req.username, Vec::new());
    let payload = req.payload.unwrap_or_default().into_bytes();
    let sessions = &state.sessions;
    match req.event.trim() {
        "connected" => sessions.connect(Some(&session)).await,
        "published" => {
            sessions
                .publish(Some(&session), req.topic.as_deref(), &payload)
                .await
        }
        "subscribed" => sessions.subscribe(Some(&session), req.topics.as_deref()).await,
        "unsubscribed" => {
            sessions
                .unsubscribe(Some(&session), req.topics.as_deref())
                .await
        }
        "disconnected" => sessions.disconnect(Some(&session)).await,
        other => return bad_request_error(format!("unsupported event: {other}")),
    }
    StatusCode::NO_CONTENT.into_response()
}

fn hook_result(result: Result<(), SessionError>, client_id: &str, hook: &str) -> Response {
    match result {
        Ok(()) => (StatusCode::OK, Json(HookResult::allow())).into_response(),
        Err(err @ SessionError::Backend(_)) => {
            warn!(target: "conduit.api", client_id = %client_id, hook = %hook, error = %err, "hook_backend_error");
            session_error(err)
        }
        Err(err) => {
            warn!(target: "conduit.api", client_id = %client_id, hook = %hook, error = %err, "hook_denied");
            (StatusCode::FORBIDDEN, Json(HookResult::deny())).into_response()
        }
    }
}
