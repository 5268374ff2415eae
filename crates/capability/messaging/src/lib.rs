//! 消息总线能力：发布/订阅抽象、subject 匹配、进程内 broker 与 MQTT 出站发布。
//!
//! subject 采用 `.` 分隔的层级：`channels.<channel>[.<subtopic>]`。
//! 订阅模式支持 `*`（匹配一段）与 `>`（匹配剩余全部）。

mod broker;
mod mqtt;

use async_trait::async_trait;
use domain::Message;
use std::sync::Arc;

pub use broker::{DEFAULT_QUEUE_CAPACITY, InMemoryBroker};
pub use mqtt::{MqttPublisher, MqttPublisherConfig, qos_from_u8};

/// 通道消息 subject 前缀。
pub const CHANNELS_PREFIX: &str = "channels";

/// 消息总线错误。
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("empty topic")]
    EmptyTopic,
    #[error("empty subscription id")]
    EmptyId,
    #[error("already subscribed: {0}")]
    AlreadySubscribed(String),
    #[error("not subscribed: {0}")]
    NotSubscribed(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("handler failed: {0}")]
    Handler(String),
    #[error("connection closed")]
    Closed,
}

/// 消息发布接口。
///
/// `topic` 的含义由实现决定：进程内 broker 视其为通道 id，MQTT 发布器视其为完整 MQTT topic。
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, msg: &Message) -> Result<(), MessagingError>;

    async fn close(&self) -> Result<(), MessagingError> {
        Ok(())
    }
}

/// 订阅回调。
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, msg: &Message) -> Result<(), MessagingError>;

    /// 订阅取消时调用。
    fn cancel(&self) -> Result<(), MessagingError>;
}

/// 消息订阅接口。
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn subscribe(
        &self,
        id: &str,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), MessagingError>;

    async fn unsubscribe(&self, id: &str, topic: &str) -> Result<(), MessagingError>;
}

/// 通道消息的 subject：`channels.<channel>[.<subtopic>]`。
pub fn channel_subject(channel: &str, subtopic: &str) -> String {
    if subtopic.is_empty() {
        format!("{CHANNELS_PREFIX}.{channel}")
    } else {
        format!("{CHANNELS_PREFIX}.{channel}.{subtopic}")
    }
}

/// 判断 subject 是否命中订阅模式。
///
/// `*` 匹配任意一段，`>` 匹配其后全部（含零段）。
pub fn match_subject(subject: &str, pattern: &str) -> bool {
    let subject: Vec<&str> = subject.split('.').collect();
    let pattern: Vec<&str> = pattern.split('.').collect();
    for (index, token) in pattern.iter().enumerate() {
        if *token == ">" {
            return true;
        }
        let Some(part) = subject.get(index) else {
            return false;
        };
        if *token != "*" && part != token {
            return false;
        }
    }
    subject.len() == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_includes_subtopic_when_present() {
        assert_eq!(channel_subject("abc", ""), "channels.abc");
        assert_eq!(channel_subject("abc", "temp.room1"), "channels.abc.temp.room1");
    }

    #[test]
    fn exact_subject_matches() {
        assert!(match_subject("temp.room1", "temp.room1"));
        assert!(!match_subject("temp.room1", "temp.room2"));
        assert!(!match_subject("temp", "temp.room1"));
        assert!(!match_subject("temp.room1", "temp"));
    }

    #[test]
    fn single_token_wildcard() {
        assert!(match_subject("temp.room1", "temp.*"));
        assert!(match_subject("temp.room1", "*.room1"));
        assert!(!match_subject("temp.room1.a", "temp.*"));
    }

    #[test]
    fn tail_wildcard() {
        assert!(match_subject("channels.abc", "channels.>"));
        assert!(match_subject("channels.abc.temp.room1", "channels.>"));
        assert!(match_subject("channels.abc.temp", "channels.*.>"));
        assert!(!match_subject("things.abc", "channels.>"));
    }
}
