//! 规则管理 handlers
//!
//! - POST /domains/{domain_id}/rules - 创建规则
//! - GET /domains/{domain_id}/rules - 分页列出规则
//! - GET /domains/{domain_id}/rules/{rule_id} - 获取规则详情
//! - PATCH /domains/{domain_id}/rules/{rule_id} - 更新规则
//! - PATCH /domains/{domain_id}/rules/{rule_id}/schedule - 替换调度配置
//! - DELETE /domains/{domain_id}/rules/{rule_id} - 删除规则
//! - POST /domains/{domain_id}/rules/{rule_id}/enable|disable - 启用/停用
//!
//! 所有接口需要 Bearer token，且 token 所属 domain 与路径一致。

use crate::AppState;
use crate::middleware::require_domain_scope;
use crate::utils::response::{bad_request_error, page_to_dto, rule_error, rule_to_dto};
use crate::utils::{
    normalize_optional, normalize_required, page_meta_from_query, schedule_from_dto,
    script_from_dto,
};
use api_contract::{ApiResponse, CreateRuleRequest, ListRulesQuery, ScheduleDto, UpdateRuleRequest};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use conduit_rules::NewRule;
use conduit_storage::RuleUpdate;

#[derive(serde::Deserialize)]
pub struct DomainPath {
    domain_id: String,
}

#[derive(serde::Deserialize)]
pub struct RulePath {
    domain_id: String,
    rule_id: String,
}

/// 创建规则
pub async fn create_rule(
    State(state): State<AppState>,
    Path(path): Path<DomainPath>,
    headers: HeaderMap,
    Json(req): Json<CreateRuleRequest>,
) -> Response {
    let session = match require_domain_scope(&state, &headers, &path.domain_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    let name = match normalize_required(req.name, "name") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let input_channel = match normalize_required(req.input_channel, "inputChannel") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let logic = match script_from_dto(req.logic) {
        Ok(value) => value,
        Err(response) => return response,
    };
    let schedule = match req.schedule.map(schedule_from_dto).transpose() {
        Ok(value) => value.unwrap_or_default(),
        Err(response) => return response,
    };
    let rule = NewRule {
        name,
        metadata: req.metadata,
        input_channel,
        input_topic: req.input_topic.trim().to_string(),
        logic,
        output_channel: req.output_channel.trim().to_string(),
        output_topic: req.output_topic.trim().to_string(),
        schedule,
    };
    match state.rules.add_rule(&session, rule).await {
        Ok(rule) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(rule_to_dto(rule))),
        )
            .into_response(),
        Err(err) => rule_error(err),
    }
}

/// 分页列出规则
pub async fn list_rules(
    State(state): State<AppState>,
    Path(path): Path<DomainPath>,
    Query(query): Query<ListRulesQuery>,
    headers: HeaderMap,
) -> Response {
    let session = match require_domain_scope(&state, &headers, &path.domain_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    let page = match page_meta_from_query(query) {
        Ok(page) => page,
        Err(response) => return response,
    };
    match state.rules.list_rules(&session, page).await {
        Ok(page) => (StatusCode::OK, Json(ApiResponse::success(page_to_dto(page)))).into_response(),
        Err(err) => rule_error(err),
    }
}

/// 获取规则详情
pub async fn get_rule(
    State(state): State<AppState>,
    Path(path): Path<RulePath>,
    headers: HeaderMap,
) -> Response {
    let session = match require_domain_scope(&state, &headers, &path.domain_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    match state.rules.view_rule(&session, &path.rule_id).await {
        Ok(rule) => (StatusCode::OK, Json(ApiResponse::success(rule_to_dto(rule)))).into_response(),
        Err(err) => rule_error(err),
    }
}

/// 更新规则
pub async fn update_rule(
    State(state): State<AppState>,
    Path(path): Path<RulePath>,
    headers: HeaderMap,
    Json(req): Json<UpdateRuleRequest>,
) -> Response {
    let session = match require_domain_scope(&state, &headers, &path.domain_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    let name = match normalize_optional(req.name, "name") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let input_channel = match normalize_optional(req.input_channel, "inputChannel") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let logic = match req.logic.map(script_from_dto).transpose() {
        Ok(value) => value,
        Err(response) => return response,
    };
    let update = RuleUpdate {
        name,
        metadata: req.metadata,
        input_channel,
        input_topic: req.input_topic.map(|value| value.trim().to_string()),
        logic,
        output_channel: req.output_channel.map(|value| value.trim().to_string()),
        output_topic: req.output_topic.map(|value| value.trim().to_string()),
    };
    if is_empty_update(&update) {
        return bad_request_error("empty update");
    }
    match state.rules.update_rule(&session, &path.rule_id, update).await {
        Ok(rule) => (StatusCode::OK, Json(ApiResponse::success(rule_to_dto(rule)))).into_response(),
        Err(err) => rule_error(err),
    }
}

/// 替换规则调度配置
pub async fn update_rule_schedule(
    State(state): State<AppState>,
    Path(path): Path<RulePath>,
    headers: HeaderMap,
    Json(req): Json<ScheduleDto>,
) -> Response {
    let session = match require_domain_scope(&state, &headers, &path.domain_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    let schedule = match schedule_from_dto(req) {
        Ok(value) => value,
        Err(response) => return response,
    };
    match state
        .rules
        .update_rule_schedule(&session, &path.rule_id, schedule)
        .await
    {
        Ok(rule) => (StatusCode::OK, Json(ApiResponse::success(rule_to_dto(rule)))).into_response(),
        Err(err) => rule_error(err),
    }
}

/// 删除规则
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(path): Path<RulePath>,
    headers: HeaderMap,
) -> Response {
    let session = match require_domain_scope(&state, &headers, &path.domain_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    match state.rules.remove_rule(&session, &path.rule_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => rule_error(err),
    }
}

/// 启用规则
pub async fn enable_rule(
    State(state): State<AppState>,
    Path(path): Path<RulePath>,
    headers: HeaderMap,
) -> Response {
    let session = match require_domain_scope(&state, &headers, &path.domain_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    match state.rules.enable_rule(&session, &path.rule_id).await {
        Ok(rule) => (StatusCode::OK, Json(ApiResponse::success(rule_to_dto(rule)))).into_response(),
        Err(err) => rule_error(err),
    }
}

/// 停用规则
pub async fn disable_rule(
    State(state): State<AppState>,
    Path(path): Path<RulePath>,
    headers: HeaderMap,
) -> Response {
    let session = match require_domain_scope(&state, &headers, &path.domain_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    match state.rules.disable_rule(&session, &path.rule_id).await {
        Ok(rule) => (StatusCode::OK, Json(ApiResponse::success(rule_to_dto(rule)))).into_response(),
        Err(err) => rule_error(err),
    }
}

fn is_empty_update(update: &RuleUpdate) -> bool {
    update.name.is_none()
        && update.metadata.is_none()
        && update.input_channel.is_none()
        && update.input_topic.is_none()
        && update.logic.is_none()
        && update.output_channel.is_none()
        && update.output_topic.is_none()
}
