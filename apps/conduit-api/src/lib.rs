//! HTTP 服务：规则管理 API、broker 会话钩子与运行指标。

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod utils;

use axum::Router;
use conduit_auth::JwtManager;
use conduit_mqtt::SessionHandler;
use conduit_rules::RuleEngineService;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 全部 handler 共享的状态。
#[derive(Clone)]
pub struct AppState {
    pub rules: Arc<RuleEngineService>,
    pub sessions: Arc<dyn SessionHandler>,
    pub jwt: Arc<JwtManager>,
}

/// 组装路由与请求上下文中间件。
pub fn build_app(state: AppState) -> Router {
    routes::create_api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(middleware::request_context))
}
