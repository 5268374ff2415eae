use crate::events::EventRecorder;
use crate::topic::{parse_channel_topic, parse_subtopic};
use crate::SessionError;
use async_trait::async_trait;
use conduit_auth::{Action, AuthError, AuthzClient, AuthzRequest};
use conduit_messaging::Publisher;
use domain::{ClientSession, MQTT_PROTOCOL, Message, created_now};
use std::sync::Arc;
use tracing::{error, info, warn};

/// broker 会话钩子。
///
/// `auth_*` 在 broker 接受对应报文前同步调用，返回错误即拒绝；
/// 会话缺失时返回 `ClientNotInitialized`。
/// 其余回调在报文生效后调用，只做日志与转发，没有可拒绝的对象，因此不返回错误。
#[async_trait]
pub trait SessionHandler: Send + Sync {
    async fn auth_connect(&self, session: Option<&ClientSession>) -> Result<(), SessionError>;

    async fn auth_publish(
        &self,
        session: Option<&ClientSession>,
        topic: Option<&str>,
        payload: &[u8],
    ) -> Result<(), SessionError>;

    async fn auth_subscribe(
        &self,
        session: Option<&ClientSession>,
        topics: Option<&[String]>,
    ) -> Result<(), SessionError>;

    async fn connect(&self, session: Option<&ClientSession>);

    async fn publish(
        &self,
        session: Option<&ClientSession>,
        topic: Option<&str>,
        payload: &[u8],
    );

    async fn subscribe(
        &self,
        session: Option<&ClientSession>,
        topics: Option<&[String]>,
    );

    async fn unsubscribe(
        &self,
        session: Option<&ClientSession>,
        topics: Option<&[String]>,
    );

    async fn disconnect(&self, session: Option<&ClientSession>);
}

/// 基于授权后端与消息总线的会话钩子实现。
pub struct MqttSessionHandler {
    publishers: Vec<Arc<dyn Publisher>>,
    authz: Arc<dyn AuthzClient>,
    events: Arc<dyn EventRecorder>,
}

impl MqttSessionHandler {
    pub fn new(
        publishers: Vec<Arc<dyn Publisher>>,
        authz: Arc<dyn AuthzClient>,
        events: Arc<dyn EventRecorder>,
    ) -> Self {
        Self {
            publishers,
            authz,
            events,
        }
    }

    async fn authorize_topic(
        &self,
        username: &str,
        topic: &str,
        action: Action,
    ) -> Result<(), SessionError> {
        let (channel, _) = parse_channel_topic(topic)?;
        let request = AuthzRequest::new(username, channel, action);
        self.authz.authorize(&request).await.map_err(|err| match err {
            AuthError::Internal(message) => SessionError::Backend(message),
            _ => SessionError::AuthorizationFailed,
        })
    }
}

#[async_trait]
impl SessionHandler for MqttSessionHandler {
    async fn auth_connect(&self, session: Option<&ClientSession>) -> Result<(), SessionError> {
        let session = session.ok_or(SessionError::ClientNotInitialized)?;
        if session.id.is_empty() {
            return Err(SessionError::MissingClientID);
        }
        let identity = match self.authz.identify(&session.password).await {
            Ok(identity) => identity,
            Err(AuthError::Internal(message)) => return Err(SessionError::Backend(message)),
            Err(_) => {
                conduit_telemetry::record_auth_failure();
                return Err(SessionError::AuthenticationFailed);
            }
        };
        if identity != session.username {
            conduit_telemetry::record_auth_failure();
            warn!(
                target: "conduit.mqtt",
                client_id = %session.id,
                username = %session.username,
                "connect_identity_mismatch"
            );
            return Err(SessionError::AuthenticationFailed);
        }

        conduit_telemetry::record_connect();
        let events = self.events.clone();
        let username = session.username.clone();
        tokio::spawn(async move {
            if let Err(err) = events.connect(&username).await {
                error!(target: "conduit.mqtt", username = %username, error = %err, "connect_event_failed");
            }
        });
        Ok(())
    }

    async fn auth_publish(
        &self,
        session: Option<&ClientSession>,
        topic: Option<&str>,
        _payload: &[u8],
    ) -> Result<(), SessionError> {
        let session = session.ok_or(SessionError::ClientNotInitialized)?;
        let topic = topic.ok_or(SessionError::MissingTopicPub)?;
        let result = self
            .authorize_topic(&session.username, topic, Action::Publish)
            .await;
        if matches!(result, Err(SessionError::AuthorizationFailed)) {
            conduit_telemetry::record_auth_failure();
        }
        result
    }

    async fn auth_subscribe(
        &self,
        session: Option<&ClientSession>,
        topics: Option<&[String]>,
    ) -> Result<(), SessionError> {
        let session = session.ok_or(SessionError::ClientNotInitialized)?;
        let topics = topics.ok_or(SessionError::MissingTopicSub)?;
        for topic in topics {
            let result = self
                .authorize_topic(&session.username, topic, Action::Subscribe)
                .await;
            if let Err(err) = result {
                if err == SessionError::AuthorizationFailed {
                    conduit_telemetry::record_auth_failure();
                }
                return Err(err);
            }
        }
        Ok(())
    }

    async fn connect(&self, session: Option<&ClientSession>) {
        let Some(session) = session else {
            error!(target: "conduit.mqtt", "connect_without_session");
            return;
        };
        info!(
            target: "conduit.mqtt",
            client_id = %session.id,
            username = %session.username,
            "client_connected"
        );
    }

    async fn publish(
        &self,
        session: Option<&ClientSession>,
        topic: Option<&str>,
        payload: &[u8],
    ) {
        let Some(session) = session else {
            error!(target: "conduit.mqtt", "publish_without_session");
            return;
        };
        let Some(topic) = topic else {
            error!(target: "conduit.mqtt", client_id = %session.id, "publish_without_topic");
            return;
        };
        info!(
            target: "conduit.mqtt",
            client_id = %session.id,
            topic = %topic,
            payload_size = payload.len(),
            "client_published"
        );

        let parsed = parse_channel_topic(topic)
            .and_then(|(channel, raw)| Ok((channel, parse_subtopic(&raw)?)));
        let (channel, subtopic) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                error!(target: "conduit.mqtt", client_id = %session.id, topic = %topic, error = %err, "publish_topic_rejected");
                return;
            }
        };

        let msg = Arc::new(Message {
            protocol: MQTT_PROTOCOL.to_string(),
            channel,
            subtopic,
            publisher: session.username.clone(),
            payload: payload.to_vec(),
            created: created_now(),
        });
        for publisher in &self.publishers {
            let publisher = publisher.clone();
            let msg = msg.clone();
            tokio::spawn(async move {
                match publisher.publish(&msg.channel, &msg).await {
                    Ok(()) => conduit_telemetry::record_message_published(),
                    Err(err) => {
                        conduit_telemetry::record_publish_failure();
                        error!(
                            target: "conduit.mqtt",
                            channel = %msg.channel,
                            subtopic = %msg.subtopic,
                            error = %err,
                            "message_publish_failed"
                        );
                    }
                }
            });
        }
    }

    async fn subscribe(
        &self,
        session: Option<&ClientSession>,
        topics: Option<&[String]>,
    ) {
        let Some(session) = session else {
            error!(target: "conduit.mqtt", "subscribe_without_session");
            return;
        };
        info!(
            target: "conduit.mqtt",
            client_id = %session.id,
            topics = ?topics.unwrap_or_default(),
            "client_subscribed"
        );
    }

    async fn unsubscribe(
        &self,
        session: Option<&ClientSession>,
        topics: Option<&[String]>,
    ) {
        let Some(session) = session else {
            error!(target: "conduit.mqtt", "unsubscribe_without_session");
            return;
        };
        info!(
            target: "conduit.mqtt",
            client_id = %session.id,
            topics = ?topics.unwrap_or_default(),
            "client_unsubscribed"
        );
    }

    async fn disconnect(&self, session: Option<&ClientSession>) {
        let Some(session) = session else {
            error!(target: "conduit.mqtt", "disconnect_without_session");
            return;
        };
        info!(
            target: "conduit.mqtt",
            client_id = %session.id,
            username = %session.username,
            "client_disconnected"
        );
        let events = self.events.clone();
        let username = session.username.clone();
        tokio::spawn(async move {
            if let Err(err) = events.disconnect(&username).await {
                error!(target: "conduit.mqtt", username = %username, error = %err, "disconnect_event_failed");
            }
        });
    }
}
