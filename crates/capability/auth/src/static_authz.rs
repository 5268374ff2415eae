use crate::{AuthError, AuthzClient, AuthzRequest};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use subtle::ConstantTimeEq;

/// 静态鉴权后端：客户端密钥与通道连接关系由配置给出。
///
/// 已连接到通道的客户端可在该通道上发布和订阅。
pub struct StaticAuthz {
    clients: RwLock<Vec<(String, Vec<u8>)>>,
    connections: RwLock<HashMap<String, HashSet<String>>>,
}

impl StaticAuthz {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(Vec::new()),
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// 注册客户端密钥（同一 client 重复注册时覆盖）。
    pub fn add_client(
        &self,
        client_id: impl Into<String>,
        secret: impl Into<Vec<u8>>,
    ) -> Result<(), AuthError> {
        let client_id = client_id.into();
        let mut clients = self
            .clients
            .write()
            .map_err(|_| AuthError::Internal("lock failed".to_string()))?;
        clients.retain(|(id, _)| *id != client_id);
        clients.push((client_id, secret.into()));
        Ok(())
    }

    /// 连接客户端与通道。
    pub fn connect(
        &self,
        client_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Result<(), AuthError> {
        let mut connections = self
            .connections
            .write()
            .map_err(|_| AuthError::Internal("lock failed".to_string()))?;
        connections
            .entry(channel_id.into())
            .or_default()
            .insert(client_id.into());
        Ok(())
    }
}

impl Default for StaticAuthz {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthzClient for StaticAuthz {
    async fn identify(&self, secret: &[u8]) -> Result<String, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::Authentication);
        }
        let clients = self
            .clients
            .read()
            .map_err(|_| AuthError::Internal("lock failed".to_string()))?;
        // 遍历全部条目，匹配耗时不随命中位置变化
        let mut found = None;
        for (client_id, stored) in clients.iter() {
            if bool::from(stored.as_slice().ct_eq(secret)) {
                found = Some(client_id.clone());
            }
        }
        found.ok_or(AuthError::Authentication)
    }

    async fn authorize(&self, request: &AuthzRequest) -> Result<(), AuthError> {
        let connections = self
            .connections
            .read()
            .map_err(|_| AuthError::Internal("lock failed".to_string()))?;
        let allowed = connections
            .get(&request.object)
            .is_some_and(|clients| clients.contains(&request.subject));
        if allowed {
            Ok(())
        } else {
            Err(AuthError::Authorization)
        }
    }
}
