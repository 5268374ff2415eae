//! 追踪、请求 ID 与进程级计数指标。

use serde::Serialize;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 指标快照（`GET /metrics` 输出）。
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub connects: u64,
    pub auth_failures: u64,
    pub messages_published: u64,
    pub publish_failures: u64,
    pub messages_forwarded: u64,
    pub forward_skipped: u64,
    pub forward_failures: u64,
    pub events_enqueued: u64,
    pub events_dropped: u64,
    pub rules_executed: u64,
    pub rules_failed: u64,
    pub rule_outputs: u64,
    pub scheduler_ticks: u64,
}

/// 进程级计数指标。
pub struct TelemetryMetrics {
    connects: AtomicU64,
    auth_failures: AtomicU64,
    messages_published: AtomicU64,
    publish_failures: AtomicU64,
    messages_forwarded: AtomicU64,
    forward_skipped: AtomicU64,
    forward_failures: AtomicU64,
    events_enqueued: AtomicU64,
    events_dropped: AtomicU64,
    rules_executed: AtomicU64,
    rules_failed: AtomicU64,
    rule_outputs: AtomicU64,
    scheduler_ticks: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            connects: AtomicU64::new(0),
            auth_failures: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            messages_forwarded: AtomicU64::new(0),
            forward_skipped: AtomicU64::new(0),
            forward_failures: AtomicU64::new(0),
            events_enqueued: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            rules_executed: AtomicU64::new(0),
            rules_failed: AtomicU64::new(0),
            rule_outputs: AtomicU64::new(0),
            scheduler_ticks: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            messages_forwarded: self.messages_forwarded.load(Ordering::Relaxed),
            forward_skipped: self.forward_skipped.load(Ordering::Relaxed),
            forward_failures: self.forward_failures.load(Ordering::Relaxed),
            events_enqueued: self.events_enqueued.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            rules_executed: self.rules_executed.load(Ordering::Relaxed),
            rules_failed: self.rules_failed.load(Ordering::Relaxed),
            rule_outputs: self.rule_outputs.load(Ordering::Relaxed),
            scheduler_ticks: self.scheduler_ticks.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录客户端连接鉴权成功次数。
pub fn record_connect() {
    metrics().connects.fetch_add(1, Ordering::Relaxed);
}

/// 记录鉴权/授权失败次数。
pub fn record_auth_failure() {
    metrics().auth_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录消息发布成功次数（每个 publisher 计一次）。
pub fn record_message_published() {
    metrics().messages_published.fetch_add(1, Ordering::Relaxed);
}

/// 记录消息发布失败次数。
pub fn record_publish_failure() {
    metrics().publish_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录转发到 MQTT 的次数。
pub fn record_message_forwarded() {
    metrics().messages_forwarded.fetch_add(1, Ordering::Relaxed);
}

/// 记录转发器因回环跳过的次数。
pub fn record_forward_skipped() {
    metrics().forward_skipped.fetch_add(1, Ordering::Relaxed);
}

/// 记录转发失败次数。
pub fn record_forward_failure() {
    metrics().forward_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录生命周期事件入队次数。
pub fn record_event_enqueued() {
    metrics().events_enqueued.fetch_add(1, Ordering::Relaxed);
}

/// 记录生命周期事件丢弃次数（队列满或写入失败）。
pub fn record_event_dropped() {
    metrics().events_dropped.fetch_add(1, Ordering::Relaxed);
}

/// 记录规则执行次数。
pub fn record_rule_executed() {
    metrics().rules_executed.fetch_add(1, Ordering::Relaxed);
}

/// 记录规则执行失败次数。
pub fn record_rule_failed() {
    metrics().rules_failed.fetch_add(1, Ordering::Relaxed);
}

/// 记录规则输出消息次数。
pub fn record_rule_output() {
    metrics().rule_outputs.fetch_add(1, Ordering::Relaxed);
}

/// 记录调度器 tick 次数。
pub fn record_scheduler_tick() {
    metrics().scheduler_ticks.fetch_add(1, Ordering::Relaxed);
}
