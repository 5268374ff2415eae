//! conduit 服务入口：装配会话钩子、规则引擎与 HTTP API。

use chrono::FixedOffset;
use conduit_api::{AppState, build_app};
use conduit_auth::{JwtManager, StaticAuthz};
use conduit_config::AppConfig;
use conduit_messaging::{InMemoryBroker, MqttPublisher, MqttPublisherConfig, Publisher, Subscriber};
use conduit_mqtt::{EventStore, Forwarder, MqttSessionHandler};
use conduit_rules::{RuleEngineConfig, RuleEngineService, ScriptRegistry};
use conduit_storage::{
    InMemoryEventSink, InMemoryRuleRepository, LifecycleEventSink, PgRuleRepository,
    RedisEventSink, RuleRepository,
};
use conduit_telemetry::init_tracing;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 规则引擎在进程内 broker 上的订阅 id。
const RULES_SUBSCRIPTION_ID: &str = "conduit.re";
/// MQTT 回流转发器的订阅 id。
const FORWARDER_SUBSCRIPTION_ID: &str = "conduit.mqtt.forwarder";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();
    let cancel = CancellationToken::new();

    // 鉴权后端：客户端密钥与通道连接来自配置
    let authz = Arc::new(StaticAuthz::new());
    for client in &config.authz_clients {
        authz.add_client(client.client_id.clone(), client.secret.clone().into_bytes())?;
    }
    for connection in &config.authz_connections {
        authz.connect(connection.client_id.clone(), connection.channel_id.clone())?;
    }

    let broker = Arc::new(InMemoryBroker::new());

    // 生命周期事件：配置 Redis 时写入 stream，否则保存在内存
    let sink: Arc<dyn LifecycleEventSink> = match &config.redis_url {
        Some(url) => Arc::new(RedisEventSink::connect(
            url,
            config.redis_event_stream.clone(),
            config.redis_event_stream_max_len,
        )?),
        None => {
            warn!(target: "conduit.api", "redis_not_configured_using_in_memory_events");
            Arc::new(InMemoryEventSink::new())
        }
    };
    let events = Arc::new(EventStore::new(
        sink,
        config.instance_id.clone(),
        config.event_queue_capacity,
        cancel.child_token(),
    ));

    let publishers: Vec<Arc<dyn Publisher>> = vec![broker.clone()];
    let sessions = Arc::new(MqttSessionHandler::new(publishers, authz, events));

    if config.forwarder_enabled {
        let (mqtt, _eventloop) = MqttPublisher::connect(MqttPublisherConfig {
            host: config.mqtt_host.clone(),
            port: config.mqtt_port,
            username: config.mqtt_username.clone(),
            password: config.mqtt_password.clone(),
            qos: config.mqtt_qos,
        })?;
        let forwarder = Forwarder::new(config.forwarder_topic.clone());
        forwarder
            .forward(FORWARDER_SUBSCRIPTION_ID, broker.clone(), Arc::new(mqtt))
            .await?;
    }

    // 规则存储：配置数据库时使用 Postgres
    let repo: Arc<dyn RuleRepository> = match &config.database_url {
        Some(url) => Arc::new(PgRuleRepository::connect(url).await?),
        None => {
            warn!(target: "conduit.api", "database_not_configured_using_in_memory_rules");
            Arc::new(InMemoryRuleRepository::new())
        }
    };
    let timezone = FixedOffset::east_opt(config.scheduler_tz_offset_minutes * 60)
        .ok_or("invalid scheduler timezone offset")?;
    let rules = Arc::new(RuleEngineService::new(
        repo,
        broker.clone(),
        ScriptRegistry::with_lua(Duration::from_millis(config.script_timeout_ms)),
        RuleEngineConfig {
            tick: Duration::from_secs(config.scheduler_tick_seconds),
            timezone,
            error_buffer: config.rules_error_buffer,
        },
    ));

    if let Some(mut errors) = rules.take_errors() {
        tokio::spawn(async move {
            while let Some(run_error) = errors.recv().await {
                error!(
                    target: "conduit.rules",
                    rule_id = %run_error.rule_id,
                    error = %run_error.error,
                    "rule_run_failed"
                );
            }
        });
    }

    if config.rules_enabled {
        broker
            .subscribe(
                RULES_SUBSCRIPTION_ID,
                &config.rules_subscribe_topic,
                rules.clone(),
            )
            .await?;
        let scheduler = rules.clone();
        let scheduler_cancel = cancel.child_token();
        tokio::spawn(async move {
            if let Err(err) = scheduler.start_scheduler(scheduler_cancel).await {
                info!(target: "conduit.rules", reason = %err, "scheduler_exited");
            }
        });
    }

    let jwt = Arc::new(JwtManager::new(
        config.jwt_secret.clone(),
        config.jwt_access_ttl_seconds,
    ));
    let app = build_app(AppState {
        rules,
        sessions,
        jwt,
    });

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "conduit.api", addr = %config.http_addr, "http_listening");
    let served = axum::serve(listener, app).await;

    cancel.cancel();
    broker.close().await?;
    served?;
    Ok(())
}
