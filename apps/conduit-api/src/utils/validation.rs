//! 输入验证与请求体转换
//!
//! - normalize_required / normalize_optional：去除首尾空格并检查非空
//! - script_from_dto / schedule_from_dto：DTO 转规则模型
//! - page_meta_from_query：列表查询参数转分页条件（limit 默认 10，最大 100）
//!
//! 失败统一返回 bad_request_error 响应。

use crate::utils::response::bad_request_error;
use api_contract::{ListRulesQuery, ScheduleDto, ScriptDto};
use axum::response::Response;
use conduit_storage::{PageMeta, RecurringType, RuleStatus, Schedule, Script, ScriptType, parse_schedule_time};
use std::str::FromStr;

/// 列表默认条数。
pub const DEFAULT_PAGE_LIMIT: u64 = 10;
/// 列表最大条数。
pub const MAX_PAGE_LIMIT: u64 = 100;

/// 验证必填字段，去除空格并检查非空
pub fn normalize_required(value: String, field: &str) -> Result<String, Response> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(bad_request_error(format!("{field} required")));
    }
    Ok(trimmed.to_string())
}

/// 验证可选字段，如果提供则去除空格并检查非空
pub fn normalize_optional(value: Option<String>, field: &str) -> Result<Option<String>, Response> {
    match value {
        Some(value) => normalize_required(value, field).map(Some),
        None => Ok(None),
    }
}

pub fn script_from_dto(dto: ScriptDto) -> Result<Script, Response> {
    let script_type =
        ScriptType::from_str(&dto.script_type).map_err(|err| bad_request_error(err.to_string()))?;
    let value = normalize_required(dto.value, "logic.value")?;
    Ok(Script { script_type, value })
}

pub fn schedule_from_dto(dto: ScheduleDto) -> Result<Schedule, Response> {
    let start_datetime = match dto.start_datetime.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => Some(parse_time(value)?),
        _ => None,
    };
    let recurring_time = dto
        .recurring_time
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(parse_time)
        .collect::<Result<Vec<_>, _>>()?;
    let recurring_type = RecurringType::from_str(&dto.recurring_type)
        .map_err(|err| bad_request_error(err.to_string()))?;
    Ok(Schedule {
        start_datetime,
        recurring_time,
        recurring_type,
        recurring_period: dto.recurring_period,
    })
}

pub fn page_meta_from_query(query: ListRulesQuery) -> Result<PageMeta, Response> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(bad_request_error(format!(
            "limit must be between 1 and {MAX_PAGE_LIMIT}"
        )));
    }
    let status = match query.status.as_deref() {
        None | Some("all") => None,
        Some(value) => {
            Some(RuleStatus::from_str(value).map_err(|err| bad_request_error(err.to_string()))?)
        }
    };
    let recurring_type = query
        .recurring_type
        .as_deref()
        .map(RecurringType::from_str)
        .transpose()
        .map_err(|err| bad_request_error(err.to_string()))?;
    Ok(PageMeta {
        offset: query.offset.unwrap_or(0),
        limit,
        name: query.name.filter(|name| !name.trim().is_empty()),
        domain_id: None,
        input_channel: query.input_channel,
        output_channel: query.output_channel,
        status,
        scheduled_before: query.scheduled_before.as_deref().map(parse_time).transpose()?,
        scheduled_after: query.scheduled_after.as_deref().map(parse_time).transpose()?,
        recurring_type,
    })
}

fn parse_time(value: &str) -> Result<chrono::NaiveDateTime, Response> {
    parse_schedule_time(value).map_err(|err| bad_request_error(err.to_string()))
}
