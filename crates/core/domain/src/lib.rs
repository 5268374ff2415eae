pub mod message;

pub use message::{MQTT_PROTOCOL, Message, RULES_PROTOCOL, RULES_PUBLISHER, created_now};

/// MQTT 客户端会话：由 broker 在每个连接上提供，不做持久化。
#[derive(Debug, Clone, Default)]
pub struct ClientSession {
    /// 连接级 client id。
    pub id: String,
    /// 客户端声明的身份。
    pub username: String,
    /// 连接时提交的密钥（原始字节）。
    pub password: Vec<u8>,
}

impl ClientSession {
    pub fn new(id: impl Into<String>, username: impl Into<String>, password: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

/// 管理端会话：规则 CRUD 的执行上下文。
#[derive(Debug, Clone, Default)]
pub struct AuthSession {
    pub domain_id: String,
    pub user_id: String,
}

impl AuthSession {
    /// 构造显式 domain 与用户的会话。
    pub fn new(domain_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            domain_id: domain_id.into(),
            user_id: user_id.into(),
        }
    }
}
