use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use conduit_api::{AppState, build_app};
use conduit_auth::{JwtManager, StaticAuthz};
use conduit_messaging::{InMemoryBroker, Publisher};
use conduit_mqtt::{EventStore, MqttSessionHandler};
use conduit_rules::{RuleEngineConfig, RuleEngineService, ScriptRegistry};
use conduit_storage::{InMemoryEventSink, InMemoryRuleRepository};
use domain::AuthSession;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

struct TestApp {
    router: axum::Router,
    jwt: Arc<JwtManager>,
}

impl TestApp {
    fn new() -> Self {
        let authz = Arc::new(StaticAuthz::new());
        authz.add_client("thing-1", b"key-1".to_vec()).expect("client");
        authz.connect("thing-1", "abc").expect("connect");
        let broker = Arc::new(InMemoryBroker::new());
        let events = Arc::new(EventStore::new(
            Arc::new(InMemoryEventSink::new()),
            "test",
            16,
            CancellationToken::new(),
        ));
        let publishers: Vec<Arc<dyn Publisher>> = vec![broker.clone()];
        let sessions = Arc::new(MqttSessionHandler::new(publishers, authz, events));
        let rules = Arc::new(RuleEngineService::new(
            Arc::new(InMemoryRuleRepository::new()),
            broker,
            ScriptRegistry::with_lua(Duration::from_millis(500)),
            RuleEngineConfig::default(),
        ));
        let jwt = Arc::new(JwtManager::new("secret".to_string(), 3600));
        let router = build_app(AppState {
            rules,
            sessions,
            jwt: jwt.clone(),
        });
        Self { router, jwt }
    }

    fn token(&self, domain_id: &str) -> String {
        self.jwt
            .issue_access(&AuthSession::new(domain_id, "admin"))
            .expect("token")
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }
}

fn rule_body() -> Value {
    json!({
        "name": "  doubler ",
        "inputChannel": "abc",
        "inputTopic": "temp",
        "logic": { "type": "lua", "value": "return message.payload" },
        "outputChannel": "out",
        "schedule": {
            "startDatetime": "2024-01-01T08:00",
            "recurringType": "daily",
            "recurringPeriod": 1
        }
    })
}

#[tokio::test]
async fn health_is_public_and_tagged() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert!(response.headers().contains_key("x-trace-id"));
}

#[tokio::test]
async fn rules_require_matching_domain() {
    let app = TestApp::new();
    let (status, body) = app.send("GET", "/domains/d1/rules", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH.UNAUTHORIZED");

    let (status, _) = app
        .send("GET", "/domains/d1/rules", Some("not-a-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let other = app.token("d2");
    let (status, _) = app
        .send("GET", "/domains/d1/rules", Some(&other), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rule_lifecycle_over_http() {
    let app = TestApp::new();
    let token = app.token("d1");

    let (status, body) = app
        .send("POST", "/domains/d1/rules", Some(&token), Some(rule_body()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let rule = &body["data"];
    assert_eq!(rule["name"], "doubler");
    assert_eq!(rule["domainId"], "d1");
    assert_eq!(rule["status"], "enabled");
    assert_eq!(rule["createdBy"], "admin");
    assert_eq!(rule["schedule"]["startDatetime"], "2024-01-01T08:00");
    assert_eq!(rule["schedule"]["recurringType"], "daily");
    let id = rule["id"].as_str().expect("id").to_string();

    let (status, body) = app
        .send("GET", &format!("/domains/d1/rules/{id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["inputTopic"], "temp");

    let (status, body) = app
        .send(
            "PATCH",
            &format!("/domains/d1/rules/{id}"),
            Some(&token),
            Some(json!({ "outputTopic": "doubled" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outputTopic"], "doubled");
    assert_eq!(body["data"]["updatedBy"], "admin");

    let (status, body) = app
        .send(
            "POST",
            &format!("/domains/d1/rules/{id}/disable"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "disabled");

    let (status, body) = app
        .send(
            "GET",
            "/domains/d1/rules?status=disabled&limit=5",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["limit"], 5);

    let (status, _) = app
        .send("DELETE", &format!("/domains/d1/rules/{id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .send("GET", &format!("/domains/d1/rules/{id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn invalid_rule_input_is_rejected() {
    let app = TestApp::new();
    let token = app.token("d1");

    let mut body = rule_body();
    body["schedule"]["recurringType"] = json!("hourly");
    let (status, _) = app
        .send("POST", "/domains/d1/rules", Some(&token), Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = rule_body();
    body["name"] = json!("   ");
    let (status, _) = app
        .send("POST", "/domains/d1/rules", Some(&token), Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send("GET", "/domains/d1/rules?limit=0", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, created) = app
        .send("POST", "/domains/d1/rules", Some(&token), Some(rule_body()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["data"]["id"].as_str().expect("id");
    let (status, _) = app
        .send(
            "PATCH",
            &format!("/domains/d1/rules/{id}"),
            Some(&token),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn schedule_can_be_replaced() {
    let app = TestApp::new();
    let token = app.token("d1");
    let (_, created) = app
        .send("POST", "/domains/d1/rules", Some(&token), Some(rule_body()))
        .await;
    let id = created["data"]["id"].as_str().expect("id");

    let (status, body) = app
        .send(
            "PATCH",
            &format!("/domains/d1/rules/{id}/schedule"),
            Some(&token),
            Some(json!({
                "startDatetime": "2024-02-01T00:00",
                "recurringTime": ["2024-02-03T12:30"],
                "recurringType": "weekly",
                "recurringPeriod": 2
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let schedule = &body["data"]["schedule"];
    assert_eq!(schedule["recurringType"], "weekly");
    assert_eq!(schedule["recurringPeriod"], 2);
    assert_eq!(schedule["recurringTime"][0], "2024-02-03T12:30");
}

#[tokio::test]
async fn mqtt_hooks_allow_and_deny() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            "POST",
            "/mqtt/auth",
            None,
            Some(json!({ "clientid": "c-1", "username": "thing-1", "password": "key-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "allow");

    let (status, body) = app
        .send(
            "POST",
            "/mqtt/auth",
            None,
            Some(json!({ "clientId": "c-1", "username": "thing-1", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["result"], "deny");

    let (status, _) = app
        .send(
            "POST",
            "/mqtt/acl",
            None,
            Some(json!({
                "clientId": "c-1",
                "username": "thing-1",
                "action": "subscribe",
                "topic": "channels/abc/messages/temp"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(
            "POST",
            "/mqtt/acl",
            None,
            Some(json!({
                "clientId": "c-1",
                "username": "thing-1",
                "action": "publish",
                "topic": "channels/other/messages"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            "POST",
            "/mqtt/acl",
            None,
            Some(json!({
                "clientId": "c-1",
                "username": "thing-1",
                "action": "retain",
                "topic": "channels/abc/messages"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn mqtt_events_are_accepted() {
    let app = TestApp::new();

    let (status, _) = app
        .send(
            "POST",
            "/mqtt/events",
            None,
            Some(json!({
                "event": "published",
                "clientId": "c-1",
                "username": "thing-1",
                "topic": "channels/abc/messages/temp",
                "payload": "21"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(
            "POST",
            "/mqtt/events",
            None,
            Some(json!({
                "event": "published",
                "clientId": "c-1",
                "username": "thing-1",
                "topic": "devices/abc"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(
            "POST",
            "/mqtt/events",
            None,
            Some(json!({
                "event": "published",
                "clientId": "c-1",
                "username": "thing-1",
                "topic": "channels/abc/messages/te*mp"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(
            "POST",
            "/mqtt/events",
            None,
            Some(json!({ "event": "published", "clientId": "c-1", "username": "thing-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(
            "POST",
            "/mqtt/events",
            None,
            Some(json!({ "event": "disconnected", "clientId": "c-1", "username": "thing-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn metrics_require_token() {
    let app = TestApp::new();
    let (status, _) = app.send("GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.token("d1");
    let (status, body) = app.send("GET", "/metrics", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}
