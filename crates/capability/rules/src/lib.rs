//! 规则引擎能力：规则管理、消息触发的脚本执行与定时调度。
//!
//! - `service`：规则 CRUD、消息消费、脚本执行与输出发布、调度循环
//! - `schedule`：调度判定（纯函数）
//! - `script`：脚本执行器（Lua 沙箱）
//! - `crypto`：脚本可调用的 AES-CBC 加解密
//!
//! 单条规则执行失败通过错误通道上报，不影响其他规则与后续消息。

mod crypto;
mod schedule;
mod script;
mod service;

use conduit_storage::{StorageError, StorageErrorKind};

pub use schedule::should_run_rule;
pub use script::{LuaExecutor, ScriptError, ScriptExecutor, ScriptRegistry};
pub use service::{MAX_PAYLOAD_BYTES, NewRule, RuleEngineConfig, RuleEngineService};

/// 规则引擎错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("rule not found")]
    NotFound,
    #[error("invalid rule: {0}")]
    Invalid(String),
    #[error("rule already exists: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("failed to publish rule output: {0}")]
    Publish(String),
    #[error("max payload size of 100kB exceeded: {0}")]
    PayloadTooLarge(usize),
    #[error("scheduler cancelled")]
    Cancelled,
}

impl From<StorageError> for RuleError {
    fn from(err: StorageError) -> Self {
        match err.kind() {
            StorageErrorKind::Invalid => RuleError::Invalid(err.to_string()),
            StorageErrorKind::Conflict => RuleError::Conflict(err.to_string()),
            StorageErrorKind::Backend => RuleError::Storage(err.to_string()),
        }
    }
}

/// 错误通道上的单条执行失败记录（列表查询失败时 rule_id 为空）。
#[derive(Debug, Clone)]
pub struct RuleRunError {
    pub rule_id: String,
    pub error: RuleError,
}
