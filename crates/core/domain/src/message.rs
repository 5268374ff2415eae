use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// MQTT 会话侧产生的消息协议标识。
pub const MQTT_PROTOCOL: &str = "mqtt";

/// 规则引擎产生的消息协议标识。
pub const RULES_PROTOCOL: &str = "re";

/// 规则引擎输出消息的 publisher 标识。
pub const RULES_PUBLISHER: &str = "conduit.re";

/// 平台内部统一消息。
///
/// 构造后不再修改，发布扇出时以共享引用传递。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub protocol: String,
    pub channel: String,
    #[serde(default)]
    pub subtopic: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub payload: Vec<u8>,
    /// 创建时间（Unix 纳秒）。
    pub created: i64,
}

impl Message {
    /// 是否来自 MQTT 会话（转发器据此防止回环）。
    pub fn is_mqtt(&self) -> bool {
        self.protocol == MQTT_PROTOCOL
    }
}

static LAST_CREATED: AtomicI64 = AtomicI64::new(0);

/// 消息创建时间戳（Unix 纳秒），进程内严格递增。
pub fn created_now() -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or_default();
    let previous = LAST_CREATED
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
            Some(now.max(last.saturating_add(1)))
        })
        .unwrap_or(now);
    now.max(previous.saturating_add(1))
}
