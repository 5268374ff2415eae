//! 稳定的 DTO 与 API 响应契约。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 规则脚本。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptDto {
    #[serde(rename = "type", default = "default_script_type")]
    pub script_type: String,
    pub value: String,
}

fn default_script_type() -> String {
    "lua".to_string()
}

/// 规则调度，时间格式 `YYYY-MM-DDTHH:MM`。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDto {
    #[serde(default, alias = "start_datetime", skip_serializing_if = "Option::is_none")]
    pub start_datetime: Option<String>,
    #[serde(default, alias = "recurring_time")]
    pub recurring_time: Vec<String>,
    #[serde(default, alias = "recurring_type")]
    pub recurring_type: String,
    #[serde(default, alias = "recurring_period")]
    pub recurring_period: u32,
}

/// 规则创建请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleRequest {
    pub name: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub input_channel: String,
    #[serde(default)]
    pub input_topic: String,
    pub logic: ScriptDto,
    #[serde(default)]
    pub output_channel: String,
    #[serde(default)]
    pub output_topic: String,
    #[serde(default)]
    pub schedule: Option<ScheduleDto>,
}

/// 规则更新请求体（缺省字段保持不变）。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRuleRequest {
    pub name: Option<String>,
    pub metadata: Option<Map<String, Value>>,
    pub input_channel: Option<String>,
    pub input_topic: Option<String>,
    pub logic: Option<ScriptDto>,
    pub output_channel: Option<String>,
    pub output_topic: Option<String>,
}

/// 规则列表查询参数。
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRulesQuery {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub name: Option<String>,
    pub input_channel: Option<String>,
    pub output_channel: Option<String>,
    pub status: Option<String>,
    pub scheduled_before: Option<String>,
    pub scheduled_after: Option<String>,
    pub recurring_type: Option<String>,
}

/// 规则返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDto {
    pub id: String,
    pub name: String,
    pub domain_id: String,
    pub metadata: Map<String, Value>,
    pub input_channel: String,
    pub input_topic: String,
    pub logic: ScriptDto,
    pub output_channel: String,
    pub output_topic: String,
    pub schedule: ScheduleDto,
    pub status: String,
    pub created_at: String,
    pub created_by: String,
    pub updated_at: Option<String>,
    pub updated_by: Option<String>,
}

/// 规则分页返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePageDto {
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    pub rules: Vec<RuleDto>,
}

/// broker 连接鉴权钩子请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttAuthRequest {
    #[serde(alias = "clientid", alias = "client_id")]
    pub client_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// broker 发布/订阅授权钩子请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttAclRequest {
    #[serde(alias = "clientid", alias = "client_id")]
    pub client_id: String,
    #[serde(default)]
    pub username: String,
    /// `publish` 或 `subscribe`。
    pub action: String,
    pub topic: String,
}

/// broker 会话事件通知请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttEventRequest {
    /// `connected` / `published` / `subscribed` / `unsubscribed` / `disconnected`。
    pub event: String,
    #[serde(alias = "clientid", alias = "client_id")]
    pub client_id: String,
    #[serde(default)]
    pub username: String,
    pub topic: Option<String>,
    pub topics: Option<Vec<String>>,
    /// UTF-8 文本 payload。
    pub payload: Option<String>,
}

/// broker 钩子结果。
#[derive(Debug, Serialize)]
pub struct HookResult {
    pub result: &'static str,
}

impl HookResult {
    pub fn allow() -> Self {
        Self { result: "allow" }
    }

    pub fn deny() -> Self {
        Self { result: "deny" }
    }
}
