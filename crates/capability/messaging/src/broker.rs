use crate::{
    MessageHandler, MessagingError, Publisher, Subscriber, channel_subject, match_subject,
};
use async_trait::async_trait;
use domain::Message;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// 单个订阅队列的默认容量。
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

struct Subscription {
    pattern: String,
    sender: mpsc::Sender<Arc<Message>>,
    handler: Arc<dyn MessageHandler>,
}

/// 进程内消息 broker。
///
/// 每个订阅拥有独立的有界队列与处理任务，同一订阅内按发布顺序处理；
/// 处理失败只记录日志，不影响其他订阅。队列满时丢弃该订阅的这条消息，
/// 发布方不会被慢订阅者阻塞。
pub struct InMemoryBroker {
    subscriptions: RwLock<HashMap<(String, String), Subscription>>,
    capacity: usize,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// 当前订阅数量。
    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .read()
            .map(|subscriptions| subscriptions.len())
            .unwrap_or_default()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for InMemoryBroker {
    async fn publish(&self, topic: &str, msg: &Message) -> Result<(), MessagingError> {
        if topic.is_empty() {
            return Err(MessagingError::EmptyTopic);
        }
        let subject = channel_subject(topic, &msg.subtopic);
        let msg = Arc::new(msg.clone());
        let subscriptions = self
            .subscriptions
            .read()
            .map_err(|_| MessagingError::Publish("lock failed".to_string()))?;
        let mut delivered = 0usize;
        for ((id, _), subscription) in subscriptions.iter() {
            if !match_subject(&subject, &subscription.pattern) {
                continue;
            }
            match subscription.sender.try_send(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(target: "conduit.messaging", subscription_id = %id, subject = %subject, "subscription_queue_full");
                }
                Err(TrySendError::Closed(_)) => {
                    warn!(target: "conduit.messaging", subscription_id = %id, subject = %subject, "subscription_queue_closed");
                }
            }
        }
        debug!(target: "conduit.messaging", subject = %subject, delivered, "broker_publish");
        Ok(())
    }

    async fn close(&self) -> Result<(), MessagingError> {
        let drained: Vec<Subscription> = {
            let mut subscriptions = self
                .subscriptions
                .write()
                .map_err(|_| MessagingError::Closed)?;
            subscriptions.drain().map(|(_, subscription)| subscription).collect()
        };
        for subscription in drained {
            if let Err(err) = subscription.handler.cancel() {
                warn!(target: "conduit.messaging", error = %err, "handler_cancel_failed");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Subscriber for InMemoryBroker {
    async fn subscribe(
        &self,
        id: &str,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), MessagingError> {
        if id.is_empty() {
            return Err(MessagingError::EmptyId);
        }
        if topic.is_empty() {
            return Err(MessagingError::EmptyTopic);
        }
        let key = (id.to_string(), topic.to_string());
        let mut subscriptions = self
            .subscriptions
            .write()
            .map_err(|_| MessagingError::Closed)?;
        if subscriptions.contains_key(&key) {
            return Err(MessagingError::AlreadySubscribed(format!("{id}@{topic}")));
        }

        let (sender, mut receiver) = mpsc::channel::<Arc<Message>>(self.capacity);
        let worker = handler.clone();
        let subscription_id = id.to_string();
        tokio::spawn(async move {
            while let Some(msg) = receiver.recv().await {
                if let Err(err) = worker.handle(&msg).await {
                    warn!(
                        target: "conduit.messaging",
                        subscription_id = %subscription_id,
                        channel = %msg.channel,
                        error = %err,
                        "handler_failed"
                    );
                }
            }
        });

        subscriptions.insert(
            key,
            Subscription {
                pattern: topic.to_string(),
                sender,
                handler,
            },
        );
        Ok(())
    }

    async fn unsubscribe(&self, id: &str, topic: &str) -> Result<(), MessagingError> {
        let removed = self
            .subscriptions
            .write()
            .map_err(|_| MessagingError::Closed)?
            .remove(&(id.to_string(), topic.to_string()));
        let Some(subscription) = removed else {
            return Err(MessagingError::NotSubscribed(format!("{id}@{topic}")));
        };
        // 发送端随 subscription 一起释放，处理任务在队列清空后退出
        subscription.handler.cancel()
    }
}
