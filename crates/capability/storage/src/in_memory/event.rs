//! 生命周期事件内存实现
//!
//! 未配置 Redis 时使用，同时供测试读取已写入事件。

use crate::error::StorageError;
use crate::models::LifecycleEvent;
use crate::traits::LifecycleEventSink;
use std::sync::RwLock;

/// 生命周期事件内存存储
pub struct InMemoryEventSink {
    events: RwLock<Vec<LifecycleEvent>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    /// 已写入事件（按写入顺序）
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .read()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl Default for InMemoryEventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LifecycleEventSink for InMemoryEventSink {
    async fn append(&self, event: &LifecycleEvent) -> Result<(), StorageError> {
        let mut events = self
            .events
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        events.push(event.clone());
        Ok(())
    }
}
