//! # PostgreSQL 存储实现模块
//!
//! 规则持久化的生产实现。
//!
//! ## 数据库模式要求
//!
//! ```sql
//! create table rules (
//!     id               text primary key,
//!     name             text not null,
//!     domain_id        text not null,
//!     metadata         jsonb not null default '{}',
//!     input_channel    text not null,
//!     input_topic      text not null default '',
//!     logic_type       text not null,
//!     logic_value      text not null,
//!     output_channel   text not null default '',
//!     output_topic     text not null default '',
//!     start_datetime   timestamp,
//!     recurring_time   timestamp[] not null default '{}',
//!     recurring_type   text not null default 'none',
//!     recurring_period integer not null default 0,
//!     status           text not null,
//!     created_at       timestamptz not null,
//!     created_by       text not null,
//!     updated_at       timestamptz,
//!     updated_by       text
//! );
//! create index idx_rules_domain on rules (domain_id);
//! create index idx_rules_input_channel on rules (input_channel, status);
//! ```
//!
//! `start_datetime` / `recurring_time` 为调度时区下的本地时间，不带时区。
//!
//! ## 错误处理
//!
//! - `sqlx::Error` 自动转换为 `StorageError`（唯一约束冲突映射为 Conflict）
//! - 返回 `Option<T>` / `bool` 表示"可能不存在"（查询、更新、删除）

pub mod rule;

pub use rule::*;
