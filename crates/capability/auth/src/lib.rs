//! 鉴权能力：MQTT 客户端身份识别、通道授权，以及管理端 JWT 校验。

mod jwt;
mod static_authz;

use async_trait::async_trait;

pub use jwt::JwtManager;
pub use static_authz::StaticAuthz;

/// 鉴权相关错误。
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authentication failed")]
    Authentication,
    #[error("authorization denied")]
    Authorization,
    #[error("token expired")]
    TokenExpired,
    #[error("token invalid")]
    TokenInvalid,
    #[error("internal error: {0}")]
    Internal(String),
}

/// 通道上的操作类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Publish,
    Subscribe,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Publish => "publish",
            Action::Subscribe => "subscribe",
        }
    }
}

/// 授权请求：subject 对 object（通道）执行 action。
#[derive(Debug, Clone)]
pub struct AuthzRequest {
    pub subject: String,
    pub object: String,
    pub action: Action,
}

impl AuthzRequest {
    pub fn new(subject: impl Into<String>, object: impl Into<String>, action: Action) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            action,
        }
    }
}

/// 外部鉴权后端接口，便于替换实现与测试。
#[async_trait]
pub trait AuthzClient: Send + Sync {
    /// 由连接密钥识别客户端身份（返回 client id）。
    async fn identify(&self, secret: &[u8]) -> Result<String, AuthError>;

    /// 校验 subject 是否允许对通道执行 action。
    async fn authorize(&self, request: &AuthzRequest) -> Result<(), AuthError>;
}
