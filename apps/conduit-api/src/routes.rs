//! 路由定义
//!
//! - 健康检查与指标：/health, /metrics
//! - 规则管理：/domains/:domain_id/rules/*
//! - broker 钩子：/mqtt/auth, /mqtt/acl, /mqtt/events

use crate::AppState;
use crate::handlers::*;
use axum::{
    Router,
    routing::{get, patch, post},
};

/// 创建 API 路由
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route(
            "/domains/:domain_id/rules",
            get(list_rules).post(create_rule),
        )
        .route(
            "/domains/:domain_id/rules/:rule_id",
            get(get_rule).patch(update_rule).delete(delete_rule),
        )
        .route(
            "/domains/:domain_id/rules/:rule_id/schedule",
            patch(update_rule_schedule),
        )
        .route("/domains/:domain_id/rules/:rule_id/enable", post(enable_rule))
        .route("/domains/:domain_id/rules/:rule_id/disable", post(disable_rule))
        .route("/mqtt/auth", post(mqtt_auth))
        .route("/mqtt/acl", post(mqtt_acl))
        .route("/mqtt/events", post(mqtt_events))
}
