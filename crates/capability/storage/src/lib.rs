//! # Conduit Storage 模块
//!
//! 规则引擎与 MQTT 生命周期事件的存储抽象层。
//!
//! ## 架构设计
//!
//! 1. **接口抽象层** (`traits.rs`)：`RuleRepository`、`LifecycleEventSink`
//! 2. **数据模型层** (`models.rs`)：规则、调度、分页、生命周期事件
//! 3. **错误处理层** (`error.rs`)：带类别的统一存储错误
//! 4. **验证辅助层** (`validation.rs`)：domain 与规则必填校验
//! 5. **连接管理层** (`connection.rs`)：Postgres 连接池
//! 6. **实现层**：
//!    - `in_memory/`：内存实现（测试、单实例运行）
//!    - `postgres/`：规则的 PostgreSQL 实现
//!    - `redis`：生命周期事件的 Redis Stream 实现
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use conduit_storage::{InMemoryRuleRepository, PageMeta, RuleRepository, RuleStatus};
//!
//! let repo = InMemoryRuleRepository::new();
//! let page = repo
//!     .list_rules(&PageMeta {
//!         input_channel: Some("abc".to_string()),
//!         status: Some(RuleStatus::Enabled),
//!         ..PageMeta::default()
//!     })
//!     .await?;
//! ```
//!
//! ## 约束
//!
//! - 单条规则操作都显式接收 domain_id，跨 domain 的记录视为不存在
//! - 列表查询的 domain 过滤由调用方决定（管理 API 强制带上，调度器与消息消费不带）

pub mod connection;
pub mod error;
pub mod in_memory;
pub mod models;
pub mod postgres;
pub mod redis;
pub mod traits;
pub mod validation;

pub use connection::*;
pub use error::*;
pub use models::*;
pub use redis::RedisEventSink;
pub use traits::*;
pub use validation::*;

pub use in_memory::{InMemoryEventSink, InMemoryRuleRepository};

pub use postgres::PgRuleRepository;
