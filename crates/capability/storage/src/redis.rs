//! Redis 生命周期事件流实现
//!
//! 每个事件以 `XADD <stream> MAXLEN ~ <n> *` 追加，字段：
//! `client_id`、`operation`、`instance`、`occurred_at_ms`。
//!
//! 多路复用连接在首次写入时建立并复用；写入失败后丢弃，下次写入重连。

use crate::error::StorageError;
use crate::models::LifecycleEvent;
use crate::traits::LifecycleEventSink;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use redis::streams::StreamMaxlen;
use tokio::sync::Mutex;

/// Redis Stream 事件写入
pub struct RedisEventSink {
    client: redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    stream: String,
    max_len: usize,
}

impl RedisEventSink {
    pub fn new(client: redis::Client, stream: impl Into<String>, max_len: usize) -> Self {
        Self {
            client,
            connection: Mutex::new(None),
            stream: stream.into(),
            max_len: max_len.max(1),
        }
    }

    pub fn connect(
        redis_url: &str,
        stream: impl Into<String>,
        max_len: usize,
    ) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self::new(client, stream, max_len))
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StorageError> {
        let mut cached = self.connection.lock().await;
        if let Some(connection) = cached.as_ref() {
            return Ok(connection.clone());
        }
        let connection = self.client.get_multiplexed_tokio_connection().await?;
        *cached = Some(connection.clone());
        Ok(connection)
    }

    async fn reset_connection(&self) {
        self.connection.lock().await.take();
    }
}

/// 事件字段（顺序固定）
fn event_fields(event: &LifecycleEvent) -> [(&'static str, String); 4] {
    [
        ("client_id", event.client_id.clone()),
        ("operation", event.operation.as_str().to_string()),
        ("instance", event.instance.clone()),
        ("occurred_at_ms", event.occurred_at_ms.to_string()),
    ]
}

#[async_trait::async_trait]
impl LifecycleEventSink for RedisEventSink {
    async fn append(&self, event: &LifecycleEvent) -> Result<(), StorageError> {
        let mut connection = self.connection().await?;
        let fields = event_fields(event);
        let result = connection
            .xadd_maxlen::<_, _, _, _, ()>(
                &self.stream,
                StreamMaxlen::Approx(self.max_len),
                "*",
                &fields[..],
            )
            .await;
        if let Err(err) = result {
            self.reset_connection().await;
            return Err(err.into());
        }
        Ok(())
    }
}
