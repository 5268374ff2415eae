//! 存储接口 Trait 定义
//!
//! - RuleRepository：规则存储
//! - LifecycleEventSink：MQTT 生命周期事件写入
//!
//! 设计原则：
//! - 规则的读写接口显式接收 domain_id
//! - 不存在的记录以 `Option`/`bool` 表达，不视为错误
//! - 使用 async_trait 支持动态分发

use crate::error::StorageError;
use crate::models::{
    LifecycleEvent, Page, PageMeta, Rule, RuleStatus, RuleUpdate, Schedule, UpdateStamp,
};
use async_trait::async_trait;

/// 规则存储接口
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// 新增规则（id 冲突返回 Conflict）
    async fn add_rule(&self, rule: Rule) -> Result<Rule, StorageError>;

    /// 查找指定规则
    async fn view_rule(&self, domain_id: &str, rule_id: &str)
    -> Result<Option<Rule>, StorageError>;

    /// 更新规则基础字段
    async fn update_rule(
        &self,
        domain_id: &str,
        rule_id: &str,
        update: RuleUpdate,
        stamp: UpdateStamp,
    ) -> Result<Option<Rule>, StorageError>;

    /// 替换规则调度配置
    async fn update_rule_schedule(
        &self,
        domain_id: &str,
        rule_id: &str,
        schedule: Schedule,
        stamp: UpdateStamp,
    ) -> Result<Option<Rule>, StorageError>;

    /// 更新规则状态
    async fn update_rule_status(
        &self,
        domain_id: &str,
        rule_id: &str,
        status: RuleStatus,
        stamp: UpdateStamp,
    ) -> Result<Option<Rule>, StorageError>;

    /// 删除规则
    async fn remove_rule(&self, domain_id: &str, rule_id: &str) -> Result<bool, StorageError>;

    /// 分页查询规则（按 created_at、id 升序）
    async fn list_rules(&self, page: &PageMeta) -> Result<Page, StorageError>;
}

/// 生命周期事件写入接口
#[async_trait]
pub trait LifecycleEventSink: Send + Sync {
    async fn append(&self, event: &LifecycleEvent) -> Result<(), StorageError>;
}
