//! MQTT 会话能力：topic 解析、broker 会话钩子、通道消息回流 MQTT、生命周期事件。
//!
//! 处理链路：
//! 1. broker 在 CONNECT / PUBLISH / SUBSCRIBE 前调用 `auth_*` 钩子（同步返回鉴权结果）
//! 2. 鉴权通过后的 PUBLISH 经 `publish` 转为通道消息，扇出到所有 Publisher
//! 3. Forwarder 订阅消息总线，把非 MQTT 来源的消息发布回 MQTT
//! 4. 连接/断开事件经 EventStore 异步写入事件流

mod events;
mod forwarder;
mod handler;
mod topic;

pub use events::{EventRecorder, EventStore, EventStoreError};
pub use forwarder::Forwarder;
pub use handler::{MqttSessionHandler, SessionHandler};
pub use topic::{mqtt_topic, parse_channel_topic, parse_subtopic};

/// 会话钩子错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("client is not initialized")]
    ClientNotInitialized,
    #[error("client_id not found")]
    MissingClientID,
    #[error("failed to publish due to missing topic")]
    MissingTopicPub,
    #[error("failed to subscribe due to missing topic")]
    MissingTopicSub,
    #[error("malformed topic")]
    MalformedTopic,
    #[error("malformed subtopic")]
    MalformedSubtopic,
    #[error("failed to perform authentication over the entity")]
    AuthenticationFailed,
    #[error("failed to perform authorization over the entity")]
    AuthorizationFailed,
    #[error("backend error: {0}")]
    Backend(String),
}
