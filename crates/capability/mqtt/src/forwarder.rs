use crate::topic::mqtt_topic;
use async_trait::async_trait;
use conduit_messaging::{MessageHandler, MessagingError, Publisher, Subscriber};
use domain::Message;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 把消息总线上的通道消息回流到 MQTT。
///
/// 来源协议为 MQTT 的消息直接跳过，避免回环。
pub struct Forwarder {
    topic: String,
}

impl Forwarder {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 以 `id` 订阅转发主题，消息经 `publisher` 发布到对应 MQTT topic。
    pub async fn forward(
        &self,
        id: &str,
        subscriber: Arc<dyn Subscriber>,
        publisher: Arc<dyn Publisher>,
    ) -> Result<(), MessagingError> {
        subscriber
            .subscribe(id, &self.topic, Arc::new(ForwardHandler { publisher }))
            .await?;
        info!(target: "conduit.mqtt", subscription_id = %id, topic = %self.topic, "forwarder_started");
        Ok(())
    }
}

struct ForwardHandler {
    publisher: Arc<dyn Publisher>,
}

#[async_trait]
impl MessageHandler for ForwardHandler {
    async fn handle(&self, msg: &Message) -> Result<(), MessagingError> {
        if msg.is_mqtt() {
            conduit_telemetry::record_forward_skipped();
            debug!(target: "conduit.mqtt", channel = %msg.channel, "forward_skipped");
            return Ok(());
        }
        let topic = mqtt_topic(&msg.channel, &msg.subtopic);
        let publisher = self.publisher.clone();
        let msg = msg.clone();
        tokio::spawn(async move {
            match publisher.publish(&topic, &msg).await {
                Ok(()) => conduit_telemetry::record_message_forwarded(),
                Err(err) => {
                    conduit_telemetry::record_forward_failure();
                    warn!(target: "conduit.mqtt", topic = %topic, error = %err, "forward_failed");
                }
            }
        });
        Ok(())
    }

    fn cancel(&self) -> Result<(), MessagingError> {
        Ok(())
    }
}
