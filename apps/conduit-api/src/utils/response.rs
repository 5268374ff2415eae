//! HTTP 响应辅助函数和 DTO 转换
//!
//! - 错误响应：auth_error, forbidden_error, bad_request_error, not_found_error,
//!   internal_auth_error, rule_error, session_error
//! - DTO 转换：rule_to_dto, schedule_to_dto, page_to_dto
//!
//! 所有错误返回统一的 ApiResponse 格式。

use api_contract::{ApiResponse, RuleDto, RulePageDto, ScheduleDto, ScriptDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use conduit_auth::AuthError;
use conduit_mqtt::SessionError;
use conduit_rules::RuleError;
use conduit_storage::{Page, Rule, Schedule, format_schedule_time};
use tracing::error;

/// 认证错误响应
pub fn auth_error(status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()>::error("AUTH.UNAUTHORIZED", "unauthorized")),
    )
        .into_response()
}

/// 禁止访问错误响应
pub fn forbidden_error() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(ApiResponse::<()>::error("AUTH.FORBIDDEN", "forbidden")),
    )
        .into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("INVALID.REQUEST", message.into())),
    )
        .into_response()
}

/// 资源未找到错误响应
pub fn not_found_error() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error("RESOURCE.NOT_FOUND", "not found")),
    )
        .into_response()
}

/// 认证内部错误响应
pub fn internal_auth_error(err: AuthError) -> Response {
    internal_error(err.to_string())
}

/// 规则服务错误响应
pub fn rule_error(err: RuleError) -> Response {
    match err {
        RuleError::NotFound => not_found_error(),
        RuleError::Invalid(message) => bad_request_error(message),
        RuleError::Conflict(message) => (
            StatusCode::CONFLICT,
            Json(ApiResponse::<()>::error("RESOURCE.CONFLICT", message)),
        )
            .into_response(),
        other => {
            error!(target: "conduit.api", error = %other, "rule_request_failed");
            internal_error(other.to_string())
        }
    }
}

/// 会话钩子错误响应
pub fn session_error(err: SessionError) -> Response {
    match err {
        SessionError::Backend(message) => internal_error(message),
        SessionError::AuthenticationFailed => auth_error(StatusCode::UNAUTHORIZED),
        SessionError::AuthorizationFailed => forbidden_error(),
        other => bad_request_error(other.to_string()),
    }
}

fn internal_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error("INTERNAL.ERROR", message)),
    )
        .into_response()
}

/// Schedule 转 ScheduleDto
pub fn schedule_to_dto(schedule: &Schedule) -> ScheduleDto {
    ScheduleDto {
        start_datetime: schedule.start_datetime.as_ref().map(format_schedule_time),
        recurring_time: schedule
            .recurring_time
            .iter()
            .map(format_schedule_time)
            .collect(),
        recurring_type: schedule.recurring_type.as_str().to_string(),
        recurring_period: schedule.recurring_period,
    }
}

/// Rule 转 RuleDto
pub fn rule_to_dto(rule: Rule) -> RuleDto {
    RuleDto {
        schedule: schedule_to_dto(&rule.schedule),
        id: rule.id,
        name: rule.name,
        domain_id: rule.domain_id,
        metadata: rule.metadata,
        input_channel: rule.input_channel,
        input_topic: rule.input_topic,
        logic: ScriptDto {
            script_type: rule.logic.script_type.as_str().to_string(),
            value: rule.logic.value,
        },
        output_channel: rule.output_channel,
        output_topic: rule.output_topic,
        status: rule.status.as_str().to_string(),
        created_at: rule.created_at.to_rfc3339(),
        created_by: rule.created_by,
        updated_at: rule.updated_at.map(|value| value.to_rfc3339()),
        updated_by: rule.updated_by,
    }
}

/// Page 转 RulePageDto
pub fn page_to_dto(page: Page) -> RulePageDto {
    RulePageDto {
        total: page.total,
        offset: page.offset,
        limit: page.limit,
        rules: page.rules.into_iter().map(rule_to_dto).collect(),
    }
}
