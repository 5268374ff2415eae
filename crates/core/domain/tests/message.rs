use domain::{AuthSession, ClientSession, MQTT_PROTOCOL, Message, created_now};

#[test]
fn client_session_builds() {
    let session = ClientSession::new("client-1", "thing-1", b"secret".to_vec());

    assert_eq!(session.id, "client-1");
    assert_eq!(session.username, "thing-1");
    assert_eq!(session.password, b"secret");
}

#[test]
fn auth_session_builds() {
    let session = AuthSession::new("domain-1", "user-1");
    assert_eq!(session.domain_id, "domain-1");
    assert_eq!(session.user_id, "user-1");
}

#[test]
fn message_defaults_optional_fields_on_decode() {
    let msg: Message =
        serde_json::from_str(r#"{"protocol":"http","channel":"abc","created":1}"#).expect("decode");

    assert_eq!(msg.channel, "abc");
    assert!(msg.subtopic.is_empty());
    assert!(msg.payload.is_empty());
    assert!(!msg.is_mqtt());
}

#[test]
fn mqtt_protocol_is_detected() {
    let msg = Message {
        protocol: MQTT_PROTOCOL.to_string(),
        channel: "abc".to_string(),
        subtopic: String::new(),
        publisher: "thing-1".to_string(),
        payload: b"42".to_vec(),
        created: 1,
    };
    assert!(msg.is_mqtt());
}

#[test]
fn created_timestamps_strictly_increase() {
    let mut last = created_now();
    for _ in 0..1000 {
        let next = created_now();
        assert!(next > last);
        last = next;
    }
}
