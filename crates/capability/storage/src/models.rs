//! 数据模型
//!
//! - 规则模型：Rule, RuleUpdate, Script, RuleStatus
//! - 调度模型：Schedule, RecurringType
//! - 分页查询：PageMeta, Page
//! - 生命周期事件：LifecycleEvent, LifecycleOperation

use crate::error::StorageError;
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use std::str::FromStr;

/// 调度时间的文本格式（分钟精度）。
pub const SCHEDULE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// 解析 `YYYY-MM-DDTHH:MM` 格式的调度时间。
pub fn parse_schedule_time(value: &str) -> Result<NaiveDateTime, StorageError> {
    NaiveDateTime::parse_from_str(value.trim(), SCHEDULE_TIME_FORMAT)
        .map_err(|_| StorageError::invalid(format!("invalid schedule time: {value}")))
}

/// 格式化调度时间。
pub fn format_schedule_time(value: &NaiveDateTime) -> String {
    value.format(SCHEDULE_TIME_FORMAT).to_string()
}

/// 截断到分钟（秒与纳秒清零）。
pub fn truncate_to_minute(value: NaiveDateTime) -> NaiveDateTime {
    value
        .with_second(0)
        .and_then(|value| value.with_nanosecond(0))
        .unwrap_or(value)
}

/// 脚本语言类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScriptType {
    #[default]
    Lua,
}

impl ScriptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptType::Lua => "lua",
        }
    }
}

impl FromStr for ScriptType {
    type Err = StorageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lua" => Ok(ScriptType::Lua),
            _ => Err(StorageError::invalid(format!("unsupported script type: {value}"))),
        }
    }
}

/// 规则逻辑脚本。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Script {
    pub script_type: ScriptType,
    pub value: String,
}

/// 规则状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleStatus {
    #[default]
    Enabled,
    Disabled,
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleStatus::Enabled => "enabled",
            RuleStatus::Disabled => "disabled",
        }
    }
}

impl FromStr for RuleStatus {
    type Err = StorageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "enabled" => Ok(RuleStatus::Enabled),
            "disabled" => Ok(RuleStatus::Disabled),
            _ => Err(StorageError::invalid(format!("invalid rule status: {value}"))),
        }
    }
}

/// 周期类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecurringType {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl RecurringType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurringType::None => "none",
            RecurringType::Daily => "daily",
            RecurringType::Weekly => "weekly",
            RecurringType::Monthly => "monthly",
        }
    }
}

impl FromStr for RecurringType {
    type Err = StorageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(RecurringType::None),
            "daily" => Ok(RecurringType::Daily),
            "weekly" => Ok(RecurringType::Weekly),
            "monthly" => Ok(RecurringType::Monthly),
            _ => Err(StorageError::invalid("invalid recurring type")),
        }
    }
}

/// 规则调度配置。
///
/// 所有时间均为调度时区下的本地时间（分钟精度）。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schedule {
    /// 生效起点；新建规则时为空则取当前时间。
    pub start_datetime: Option<NaiveDateTime>,
    /// 显式触发时间点，与周期规则无关。
    pub recurring_time: Vec<NaiveDateTime>,
    pub recurring_type: RecurringType,
    pub recurring_period: u32,
}

/// 规则记录。
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub domain_id: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub input_channel: String,
    /// 为空时匹配输入通道上的全部 subtopic。
    pub input_topic: String,
    pub logic: Script,
    /// 为空时脚本结果不发布。
    pub output_channel: String,
    pub output_topic: String,
    pub schedule: Schedule,
    pub status: RuleStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

/// 规则更新输入（None 表示保持原值）。
#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
    pub name: Option<String>,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    pub input_channel: Option<String>,
    pub input_topic: Option<String>,
    pub logic: Option<Script>,
    pub output_channel: Option<String>,
    pub output_topic: Option<String>,
}

/// 更新操作的审计戳。
#[derive(Debug, Clone)]
pub struct UpdateStamp {
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

/// 规则分页查询条件。
///
/// `limit == 0` 表示不限制条数；`domain_id` 为空表示跨 domain（调度器使用）。
#[derive(Debug, Clone, Default)]
pub struct PageMeta {
    pub offset: u64,
    pub limit: u64,
    pub name: Option<String>,
    pub domain_id: Option<String>,
    pub input_channel: Option<String>,
    pub output_channel: Option<String>,
    pub status: Option<RuleStatus>,
    /// start_datetime <= scheduled_before
    pub scheduled_before: Option<NaiveDateTime>,
    /// start_datetime >= scheduled_after
    pub scheduled_after: Option<NaiveDateTime>,
    pub recurring_type: Option<RecurringType>,
}

/// 规则分页结果。
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    pub rules: Vec<Rule>,
}

/// MQTT 客户端生命周期操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOperation {
    Connect,
    Disconnect,
}

impl LifecycleOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleOperation::Connect => "connect",
            LifecycleOperation::Disconnect => "disconnect",
        }
    }
}

/// 生命周期审计事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub client_id: String,
    pub operation: LifecycleOperation,
    /// 产生事件的服务实例。
    pub instance: String,
    pub occurred_at_ms: i64,
}
