use crate::{MessagingError, Publisher};
use async_trait::async_trait;
use domain::Message;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::time::Duration;
use tracing::{debug, warn};

/// MQTT 出站发布配置。
#[derive(Debug, Clone)]
pub struct MqttPublisherConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub qos: u8,
}

/// MQTT 发布器：把消息 payload 原样发布到给定 MQTT topic。
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    qos: QoS,
}

impl MqttPublisher {
    /// 建立连接并启动 eventloop 任务。
    pub fn connect(
        config: MqttPublisherConfig,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), MessagingError> {
        let client_id = format!("conduit-forwarder-{}", uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, config.host, config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (config.username, config.password) {
            options.set_credentials(username, password);
        }
        let (client, mut eventloop) = AsyncClient::new(options, 64);
        let handle = tokio::spawn(async move {
            loop {
                if let Err(err) = eventloop.poll().await {
                    warn!(target: "conduit.messaging", error = %err, "mqtt_eventloop_error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        });
        Ok((
            Self {
                client,
                qos: qos_from_u8(config.qos),
            },
            handle,
        ))
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, msg: &Message) -> Result<(), MessagingError> {
        if topic.is_empty() {
            return Err(MessagingError::EmptyTopic);
        }
        debug!(
            target: "conduit.messaging",
            topic = %topic,
            channel = %msg.channel,
            payload_size = msg.payload.len(),
            "mqtt_publish"
        );
        self.client
            .publish(topic, self.qos, false, msg.payload.clone())
            .await
            .map_err(|err| MessagingError::Publish(err.to_string()))
    }

    async fn close(&self) -> Result<(), MessagingError> {
        self.client
            .disconnect()
            .await
            .map_err(|_| MessagingError::Closed)
    }
}

/// 数值 QoS 转换（非法值按 1 处理）。
pub fn qos_from_u8(value: u8) -> QoS {
    match value {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}
