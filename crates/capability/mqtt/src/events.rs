use async_trait::async_trait;
use conduit_storage::{LifecycleEvent, LifecycleEventSink, LifecycleOperation};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 事件存储错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventStoreError {
    #[error("event queue full")]
    QueueFull,
    #[error("event store closed")]
    Closed,
}

/// 连接生命周期事件记录接口。
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn connect(&self, client_id: &str) -> Result<(), EventStoreError>;

    async fn disconnect(&self, client_id: &str) -> Result<(), EventStoreError>;
}

/// 生命周期事件存储。
///
/// 事件先进入有界队列，由单个后台任务顺序写入 sink；
/// 写入失败只记录日志。取消令牌触发后后台任务退出，之后的入队返回 `Closed`。
pub struct EventStore {
    sender: mpsc::Sender<LifecycleEvent>,
    instance: String,
}

impl EventStore {
    pub fn new(
        sink: Arc<dyn LifecycleEventSink>,
        instance: impl Into<String>,
        capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        tokio::spawn(drain(sink, receiver, cancel));
        Self {
            sender,
            instance: instance.into(),
        }
    }

    fn enqueue(
        &self,
        client_id: &str,
        operation: LifecycleOperation,
    ) -> Result<(), EventStoreError> {
        let event = LifecycleEvent {
            client_id: client_id.to_string(),
            operation,
            instance: self.instance.clone(),
            occurred_at_ms: chrono::Utc::now().timestamp_millis(),
        };
        match self.sender.try_send(event) {
            Ok(()) => {
                conduit_telemetry::record_event_enqueued();
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                conduit_telemetry::record_event_dropped();
                Err(EventStoreError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => {
                conduit_telemetry::record_event_dropped();
                Err(EventStoreError::Closed)
            }
        }
    }
}

#[async_trait]
impl EventRecorder for EventStore {
    async fn connect(&self, client_id: &str) -> Result<(), EventStoreError> {
        self.enqueue(client_id, LifecycleOperation::Connect)
    }

    async fn disconnect(&self, client_id: &str) -> Result<(), EventStoreError> {
        self.enqueue(client_id, LifecycleOperation::Disconnect)
    }
}

async fn drain(
    sink: Arc<dyn LifecycleEventSink>,
    mut receiver: mpsc::Receiver<LifecycleEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = receiver.recv() => event,
        };
        let Some(event) = event else {
            break;
        };
        match sink.append(&event).await {
            Ok(()) => debug!(
                target: "conduit.mqtt",
                client_id = %event.client_id,
                operation = event.operation.as_str(),
                "lifecycle_event_stored"
            ),
            Err(err) => warn!(
                target: "conduit.mqtt",
                client_id = %event.client_id,
                operation = event.operation.as_str(),
                error = %err,
                "lifecycle_event_store_failed"
            ),
        }
    }
    receiver.close();
    info!(target: "conduit.mqtt", "event_store_stopped");
}
