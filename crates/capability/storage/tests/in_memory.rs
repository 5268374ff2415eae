use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use conduit_storage::{
    InMemoryEventSink, InMemoryRuleRepository, LifecycleEvent, LifecycleEventSink,
    LifecycleOperation, PageMeta, RecurringType, Rule, RuleRepository, RuleStatus, RuleUpdate,
    Schedule, Script, ScriptType, StorageErrorKind, UpdateStamp,
};

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .and_then(|date| date.and_hms_opt(hour, 0, 0))
        .expect("datetime")
}

fn rule(id: &str, domain_id: &str, input_channel: &str, created_second: i64) -> Rule {
    Rule {
        id: id.to_string(),
        name: format!("Rule {id}"),
        domain_id: domain_id.to_string(),
        metadata: serde_json::Map::new(),
        input_channel: input_channel.to_string(),
        input_topic: String::new(),
        logic: Script {
            script_type: ScriptType::Lua,
            value: "return 1".to_string(),
        },
        output_channel: String::new(),
        output_topic: String::new(),
        schedule: Schedule {
            start_datetime: Some(at(1, 0)),
            ..Schedule::default()
        },
        status: RuleStatus::Enabled,
        created_at: Utc.timestamp_opt(created_second, 0).single().expect("ts"),
        created_by: "user-1".to_string(),
        updated_at: None,
        updated_by: None,
    }
}

fn stamp() -> UpdateStamp {
    UpdateStamp {
        updated_at: Utc::now(),
        updated_by: "user-2".to_string(),
    }
}

#[tokio::test]
async fn rule_in_memory_crud() {
    let repo = InMemoryRuleRepository::new();
    let created = repo.add_rule(rule("r-1", "d-1", "abc", 1)).await.expect("add");
    assert_eq!(created.id, "r-1");

    let duplicate = repo
        .add_rule(rule("r-1", "d-1", "abc", 2))
        .await
        .expect_err("duplicate");
    assert_eq!(duplicate.kind(), StorageErrorKind::Conflict);

    let found = repo.view_rule("d-1", "r-1").await.expect("view");
    assert!(found.is_some());

    let updated = repo
        .update_rule(
            "d-1",
            "r-1",
            RuleUpdate {
                name: Some("renamed".to_string()),
                output_channel: Some("abc2".to_string()),
                ..RuleUpdate::default()
            },
            stamp(),
        )
        .await
        .expect("update")
        .expect("exists");
    assert_eq!(updated.name, "renamed");
    assert_eq!(updated.output_channel, "abc2");
    assert_eq!(updated.input_channel, "abc");
    assert_eq!(updated.updated_by.as_deref(), Some("user-2"));

    let disabled = repo
        .update_rule_status("d-1", "r-1", RuleStatus::Disabled, stamp())
        .await
        .expect("status")
        .expect("exists");
    assert_eq!(disabled.status, RuleStatus::Disabled);

    assert!(repo.remove_rule("d-1", "r-1").await.expect("remove"));
    assert!(!repo.remove_rule("d-1", "r-1").await.expect("remove again"));
    assert!(repo.view_rule("d-1", "r-1").await.expect("view").is_none());
}

#[tokio::test]
async fn rule_access_is_scoped_to_domain() {
    let repo = InMemoryRuleRepository::new();
    repo.add_rule(rule("r-1", "d-1", "abc", 1)).await.expect("add");

    assert!(repo.view_rule("d-2", "r-1").await.expect("view").is_none());
    let updated = repo
        .update_rule_status("d-2", "r-1", RuleStatus::Disabled, stamp())
        .await
        .expect("status");
    assert!(updated.is_none());
    assert!(!repo.remove_rule("d-2", "r-1").await.expect("remove"));

    let err = repo.view_rule("", "r-1").await.expect_err("empty domain");
    assert_eq!(err.kind(), StorageErrorKind::Invalid);
}

#[tokio::test]
async fn schedule_update_keeps_start_when_missing() {
    let repo = InMemoryRuleRepository::new();
    repo.add_rule(rule("r-1", "d-1", "abc", 1)).await.expect("add");

    let updated = repo
        .update_rule_schedule(
            "d-1",
            "r-1",
            Schedule {
                start_datetime: None,
                recurring_time: vec![at(3, 8)],
                recurring_type: RecurringType::Daily,
                recurring_period: 2,
            },
            stamp(),
        )
        .await
        .expect("schedule")
        .expect("exists");
    assert_eq!(updated.schedule.start_datetime, Some(at(1, 0)));
    assert_eq!(updated.schedule.recurring_type, RecurringType::Daily);
    assert_eq!(updated.schedule.recurring_period, 2);
    assert_eq!(updated.schedule.recurring_time, vec![at(3, 8)]);
}

#[tokio::test]
async fn list_rules_filters_and_pages() {
    let repo = InMemoryRuleRepository::new();
    repo.add_rule(rule("r-1", "d-1", "abc", 1)).await.expect("add");
    repo.add_rule(rule("r-2", "d-1", "abc", 2)).await.expect("add");
    repo.add_rule(rule("r-3", "d-1", "xyz", 3)).await.expect("add");
    repo.add_rule(rule("r-4", "d-2", "abc", 4)).await.expect("add");
    repo.update_rule_status("d-1", "r-2", RuleStatus::Disabled, stamp())
        .await
        .expect("status");

    let page = repo
        .list_rules(&PageMeta {
            input_channel: Some("abc".to_string()),
            status: Some(RuleStatus::Enabled),
            ..PageMeta::default()
        })
        .await
        .expect("list");
    let ids: Vec<&str> = page.rules.iter().map(|rule| rule.id.as_str()).collect();
    assert_eq!(ids, vec!["r-1", "r-4"]);

    let page = repo
        .list_rules(&PageMeta {
            domain_id: Some("d-1".to_string()),
            offset: 1,
            limit: 1,
            ..PageMeta::default()
        })
        .await
        .expect("list");
    assert_eq!(page.total, 3);
    assert_eq!(page.rules.len(), 1);
    assert_eq!(page.rules[0].id, "r-2");

    let page = repo
        .list_rules(&PageMeta {
            scheduled_before: Some(at(1, 0)),
            ..PageMeta::default()
        })
        .await
        .expect("list");
    assert_eq!(page.total, 4);

    let page = repo
        .list_rules(&PageMeta {
            scheduled_after: Some(at(2, 0)),
            ..PageMeta::default()
        })
        .await
        .expect("list");
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn event_sink_keeps_order() {
    let sink = InMemoryEventSink::new();
    for (client_id, operation) in [
        ("c-1", LifecycleOperation::Connect),
        ("c-1", LifecycleOperation::Disconnect),
    ] {
        sink.append(&LifecycleEvent {
            client_id: client_id.to_string(),
            operation,
            instance: "conduit-1".to_string(),
            occurred_at_ms: 1,
        })
        .await
        .expect("append");
    }
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].operation.as_str(), "disconnect");
}
