use conduit_config::{AppConfig, ConfigError};

// 环境变量为进程级共享状态，所有断言放在同一个测试中顺序执行。
#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::remove_var("CONDUIT_JWT_SECRET");
    }
    assert!(matches!(AppConfig::from_env(), Err(ConfigError::Missing(_))));

    unsafe {
        std::env::set_var("CONDUIT_JWT_SECRET", "secret");
        std::env::set_var("CONDUIT_HTTP_ADDR", "127.0.0.1:9011");
        std::env::set_var("CONDUIT_SCHEDULER_TZ_OFFSET_MINUTES", "180");
        std::env::set_var("CONDUIT_AUTHZ_CLIENTS", "thing-1:key-1,thing-2:key-2");
        std::env::set_var("CONDUIT_AUTHZ_CONNECTIONS", "thing-1:abc");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.http_addr, "127.0.0.1:9011");
    assert_eq!(config.scheduler_tz_offset_minutes, 180);
    assert_eq!(config.scheduler_tick_seconds, 60);
    assert_eq!(config.script_timeout_ms, 1000);
    assert_eq!(config.jwt_access_ttl_seconds, 3600);
    assert!(config.database_url.is_none());
    assert_eq!(config.authz_clients.len(), 2);
    assert_eq!(config.authz_clients[1].secret, "key-2");
    assert_eq!(config.authz_connections[0].channel_id, "abc");

    unsafe {
        std::env::set_var("CONDUIT_MQTT_QOS", "3");
    }
    assert!(matches!(
        AppConfig::from_env(),
        Err(ConfigError::Invalid(key, _)) if key == "CONDUIT_MQTT_QOS"
    ));

    unsafe {
        std::env::set_var("CONDUIT_MQTT_QOS", "0");
        std::env::set_var("CONDUIT_AUTHZ_CONNECTIONS", "broken");
    }
    assert!(matches!(
        AppConfig::from_env(),
        Err(ConfigError::Invalid(key, _)) if key == "CONDUIT_AUTHZ_CONNECTIONS"
    ));
}
