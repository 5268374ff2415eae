//! 内存存储实现模块
//!
//! 用于测试和单实例演示。
//!
//! 包含以下实现：
//! - RuleRepository: InMemoryRuleRepository
//! - LifecycleEventSink: InMemoryEventSink

pub mod event;
pub mod rule;

pub use event::*;
pub use rule::*;
