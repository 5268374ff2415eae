//! 应用运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 客户端凭据（client id + 密钥）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredential {
    pub client_id: String,
    pub secret: String,
}

/// 客户端与通道的连接关系。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConnection {
    pub client_id: String,
    pub channel_id: String,
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub instance_id: String,
    /// 未配置时规则存储使用内存实现。
    pub database_url: Option<String>,
    /// 未配置时生命周期事件写入内存。
    pub redis_url: Option<String>,
    pub redis_event_stream: String,
    pub redis_event_stream_max_len: usize,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_qos: u8,
    pub forwarder_enabled: bool,
    pub forwarder_topic: String,
    pub event_queue_capacity: usize,
    pub rules_enabled: bool,
    pub rules_subscribe_topic: String,
    pub rules_error_buffer: usize,
    pub scheduler_tick_seconds: u64,
    pub scheduler_tz_offset_minutes: i32,
    pub script_timeout_ms: u64,
    pub jwt_secret: String,
    pub jwt_access_ttl_seconds: u64,
    pub authz_clients: Vec<ClientCredential>,
    pub authz_connections: Vec<ChannelConnection>,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = env::var("CONDUIT_JWT_SECRET")
            .map_err(|_| ConfigError::Missing("CONDUIT_JWT_SECRET".to_string()))?;
        let jwt_access_ttl_seconds =
            read_u64_with_default("CONDUIT_JWT_ACCESS_TTL_SECONDS", 3600)?.max(1);
        let http_addr =
            env::var("CONDUIT_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:9010".to_string());
        let instance_id =
            env::var("CONDUIT_INSTANCE_ID").unwrap_or_else(|_| "conduit".to_string());
        let database_url = read_optional("CONDUIT_DATABASE_URL");
        let redis_url = read_optional("CONDUIT_REDIS_URL");
        let redis_event_stream = env::var("CONDUIT_REDIS_EVENT_STREAM")
            .unwrap_or_else(|_| "conduit.mqtt".to_string());
        let redis_event_stream_max_len =
            read_usize_with_default("CONDUIT_REDIS_EVENT_STREAM_MAX_LEN", 100_000)?;
        let mqtt_host = env::var("CONDUIT_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = read_u16_with_default("CONDUIT_MQTT_PORT", 1883)?;
        let mqtt_username = read_optional("CONDUIT_MQTT_USERNAME");
        let mqtt_password = read_optional("CONDUIT_MQTT_PASSWORD");
        let mqtt_qos = read_u8_with_default("CONDUIT_MQTT_QOS", 1)?;
        if mqtt_qos > 2 {
            return Err(ConfigError::Invalid(
                "CONDUIT_MQTT_QOS".to_string(),
                mqtt_qos.to_string(),
            ));
        }
        let forwarder_enabled = read_bool_with_default("CONDUIT_MQTT_FORWARDER", true);
        let forwarder_topic =
            env::var("CONDUIT_MQTT_FORWARD_TOPIC").unwrap_or_else(|_| "channels.>".to_string());
        let event_queue_capacity =
            read_usize_with_default("CONDUIT_EVENT_QUEUE_CAPACITY", 1024)?.max(1);
        let rules_enabled = read_bool_with_default("CONDUIT_RULES", true);
        let rules_subscribe_topic =
            env::var("CONDUIT_RULES_SUBSCRIBE_TOPIC").unwrap_or_else(|_| "channels.>".to_string());
        let rules_error_buffer = read_usize_with_default("CONDUIT_RULES_ERROR_BUFFER", 256)?.max(1);
        let scheduler_tick_seconds =
            read_u64_with_default("CONDUIT_SCHEDULER_TICK_SECONDS", 60)?.max(1);
        let scheduler_tz_offset_minutes =
            read_i32_with_default("CONDUIT_SCHEDULER_TZ_OFFSET_MINUTES", 0)?;
        if scheduler_tz_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::Invalid(
                "CONDUIT_SCHEDULER_TZ_OFFSET_MINUTES".to_string(),
                scheduler_tz_offset_minutes.to_string(),
            ));
        }
        let script_timeout_ms = read_u64_with_default("CONDUIT_SCRIPT_TIMEOUT_MS", 1000)?.max(1);
        let authz_clients = read_pairs("CONDUIT_AUTHZ_CLIENTS")?
            .into_iter()
            .map(|(client_id, secret)| ClientCredential { client_id, secret })
            .collect();
        let authz_connections = read_pairs("CONDUIT_AUTHZ_CONNECTIONS")?
            .into_iter()
            .map(|(client_id, channel_id)| ChannelConnection {
                client_id,
                channel_id,
            })
            .collect();

        Ok(Self {
            http_addr,
            instance_id,
            database_url,
            redis_url,
            redis_event_stream,
            redis_event_stream_max_len,
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            mqtt_qos,
            forwarder_enabled,
            forwarder_topic,
            event_queue_capacity,
            rules_enabled,
            rules_subscribe_topic,
            rules_error_buffer,
            scheduler_tick_seconds,
            scheduler_tz_offset_minutes,
            script_timeout_ms,
            jwt_secret,
            jwt_access_ttl_seconds,
            authz_clients,
            authz_connections,
        })
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_usize_with_default(key: &str, default: usize) -> Result<usize, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<usize>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_i32_with_default(key: &str, default: i32) -> Result<i32, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .trim()
        .parse::<i32>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}

/// 读取 `a:b,c:d` 形式的键值对列表。
fn read_pairs(key: &str) -> Result<Vec<(String, String)>, ConfigError> {
    let Some(value) = read_optional(key) else {
        return Ok(Vec::new());
    };
    parse_pairs(&value).ok_or_else(|| ConfigError::Invalid(key.to_string(), value))
}

fn parse_pairs(value: &str) -> Option<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for item in value.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let (left, right) = item.split_once(':')?;
        let (left, right) = (left.trim(), right.trim());
        if left.is_empty() || right.is_empty() {
            return None;
        }
        pairs.push((left.to_string(), right.to_string()));
    }
    Some(pairs)
}
