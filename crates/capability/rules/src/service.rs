use crate::schedule::should_run_rule;
use crate::script::{ScriptError, ScriptRegistry};
use crate::{RuleError, RuleRunError};
use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDateTime, Offset, Utc};
use conduit_messaging::{MessageHandler, MessagingError, Publisher, match_subject};
use conduit_storage::{
    Page, PageMeta, Rule, RuleRepository, RuleStatus, RuleUpdate, Schedule, Script, UpdateStamp,
    truncate_to_minute,
};
use domain::{AuthSession, Message, RULES_PROTOCOL, RULES_PUBLISHER, created_now};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 规则引擎处理的最大消息体（100 KiB）。
pub const MAX_PAYLOAD_BYTES: usize = 100 * 1024;

/// 规则引擎运行参数。
#[derive(Debug, Clone)]
pub struct RuleEngineConfig {
    /// 调度器 tick 周期。
    pub tick: Duration,
    /// 调度时区（固定偏移）。
    pub timezone: FixedOffset,
    /// 错误通道容量。
    pub error_buffer: usize,
}

impl Default for RuleEngineConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(60),
            timezone: Utc.fix(),
            error_buffer: 256,
        }
    }
}

/// 新建规则输入。
#[derive(Debug, Clone, Default)]
pub struct NewRule {
    pub name: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub input_channel: String,
    pub input_topic: String,
    pub logic: Script,
    pub output_channel: String,
    pub output_topic: String,
    pub schedule: Schedule,
}

/// 规则引擎服务。
pub struct RuleEngineService {
    repo: Arc<dyn RuleRepository>,
    runner: RuleRunner,
    errors: Mutex<Option<mpsc::Receiver<RuleRunError>>>,
    tick: Duration,
    timezone: FixedOffset,
}

impl RuleEngineService {
    pub fn new(
        repo: Arc<dyn RuleRepository>,
        publisher: Arc<dyn Publisher>,
        scripts: ScriptRegistry,
        config: RuleEngineConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.error_buffer.max(1));
        Self {
            repo,
            runner: RuleRunner {
                publisher,
                scripts: Arc::new(scripts),
                errors: sender,
            },
            errors: Mutex::new(Some(receiver)),
            tick: config.tick,
            timezone: config.timezone,
        }
    }

    /// 取出错误通道接收端（只能取一次）。
    pub fn take_errors(&self) -> Option<mpsc::Receiver<RuleRunError>> {
        self.errors.lock().ok().and_then(|mut slot| slot.take())
    }

    pub async fn add_rule(&self, session: &AuthSession, rule: NewRule) -> Result<Rule, RuleError> {
        let mut schedule = rule.schedule;
        if schedule.start_datetime.is_none() {
            schedule.start_datetime = Some(self.now_local());
        }
        let rule = Rule {
            id: uuid::Uuid::new_v4().to_string(),
            name: rule.name,
            domain_id: session.domain_id.clone(),
            metadata: rule.metadata,
            input_channel: rule.input_channel,
            input_topic: rule.input_topic,
            logic: rule.logic,
            output_channel: rule.output_channel,
            output_topic: rule.output_topic,
            schedule,
            status: RuleStatus::Enabled,
            created_at: Utc::now(),
            created_by: session.user_id.clone(),
            updated_at: None,
            updated_by: None,
        };
        let created = self.repo.add_rule(rule).await?;
        info!(
            target: "conduit.rules",
            domain_id = %created.domain_id,
            rule_id = %created.id,
            "rule_created"
        );
        Ok(created)
    }

    pub async fn view_rule(&self, session: &AuthSession, rule_id: &str) -> Result<Rule, RuleError> {
        self.repo
            .view_rule(&session.domain_id, rule_id)
            .await?
            .ok_or(RuleError::NotFound)
    }

    pub async fn update_rule(
        &self,
        session: &AuthSession,
        rule_id: &str,
        update: RuleUpdate,
    ) -> Result<Rule, RuleError> {
        self.repo
            .update_rule(&session.domain_id, rule_id, update, stamp(session))
            .await?
            .ok_or(RuleError::NotFound)
    }

    pub async fn update_rule_schedule(
        &self,
        session: &AuthSession,
        rule_id: &str,
        schedule: Schedule,
    ) -> Result<Rule, RuleError> {
        self.repo
            .update_rule_schedule(&session.domain_id, rule_id, schedule, stamp(session))
            .await?
            .ok_or(RuleError::NotFound)
    }

    /// 列出会话所在 domain 的规则（忽略调用方给出的 domain）。
    pub async fn list_rules(
        &self,
        session: &AuthSession,
        mut page: PageMeta,
    ) -> Result<Page, RuleError> {
        page.domain_id = Some(session.domain_id.clone());
        Ok(self.repo.list_rules(&page).await?)
    }

    pub async fn remove_rule(&self, session: &AuthSession, rule_id: &str) -> Result<(), RuleError> {
        if !self.repo.remove_rule(&session.domain_id, rule_id).await? {
            return Err(RuleError::NotFound);
        }
        info!(target: "conduit.rules", domain_id = %session.domain_id, rule_id = %rule_id, "rule_removed");
        Ok(())
    }

    pub async fn enable_rule(&self, session: &AuthSession, rule_id: &str) -> Result<Rule, RuleError> {
        self.set_status(session, rule_id, RuleStatus::Enabled).await
    }

    pub async fn disable_rule(&self, session: &AuthSession, rule_id: &str) -> Result<Rule, RuleError> {
        self.set_status(session, rule_id, RuleStatus::Disabled).await
    }

    async fn set_status(
        &self,
        session: &AuthSession,
        rule_id: &str,
        status: RuleStatus,
    ) -> Result<Rule, RuleError> {
        self.repo
            .update_rule_status(&session.domain_id, rule_id, status, stamp(session))
            .await?
            .ok_or(RuleError::NotFound)
    }

    /// 为消息匹配的每条启用规则启动一个执行任务，立即返回。
    ///
    /// 规则的 input_topic 非空时，消息 subtopic 需按通配符规则匹配。
    pub async fn consume(&self, msg: &Message) -> Result<(), RuleError> {
        if msg.payload.len() > MAX_PAYLOAD_BYTES {
            return Err(RuleError::PayloadTooLarge(msg.payload.len()));
        }
        let page = self
            .repo
            .list_rules(&PageMeta {
                input_channel: Some(msg.channel.clone()),
                status: Some(RuleStatus::Enabled),
                ..PageMeta::default()
            })
            .await?;

        let msg = Arc::new(msg.clone());
        let mut matched = 0usize;
        for rule in page.rules {
            if !rule.input_topic.is_empty() && !match_subject(&msg.subtopic, &rule.input_topic) {
                continue;
            }
            matched += 1;
            let runner = self.runner.clone();
            let msg = msg.clone();
            tokio::spawn(async move { runner.run(rule, msg).await });
        }
        debug!(target: "conduit.rules", channel = %msg.channel, matched, "message_consumed");
        Ok(())
    }

    /// 执行单条规则并发布输出。
    pub async fn process(&self, rule: &Rule, msg: &Message) -> Result<(), RuleError> {
        self.runner.process(rule, msg).await
    }

    /// 调度循环：每个 tick 执行到期规则，直到取消。
    pub async fn start_scheduler(&self, cancel: CancellationToken) -> Result<(), RuleError> {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // interval 的首个 tick 立即完成，调度从一个周期之后开始
        ticker.tick().await;
        info!(target: "conduit.rules", tick_ms = self.tick.as_millis() as u64, "scheduler_started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(target: "conduit.rules", "scheduler_stopped");
                    return Err(RuleError::Cancelled);
                }
                _ = ticker.tick() => self.run_due_rules().await,
            }
        }
    }

    async fn run_due_rules(&self) {
        conduit_telemetry::record_scheduler_tick();
        let now = self.now_local();
        let page = match self
            .repo
            .list_rules(&PageMeta {
                status: Some(RuleStatus::Enabled),
                scheduled_before: Some(now),
                ..PageMeta::default()
            })
            .await
        {
            Ok(page) => page,
            Err(err) => {
                self.runner.report(String::new(), err.into());
                return;
            }
        };

        for rule in page.rules {
            if !should_run_rule(&rule.schedule, now) {
                continue;
            }
            let trigger = Arc::new(Message {
                protocol: RULES_PROTOCOL.to_string(),
                channel: rule.input_channel.clone(),
                subtopic: rule.input_topic.clone(),
                publisher: String::new(),
                payload: Vec::new(),
                created: created_now(),
            });
            let runner = self.runner.clone();
            tokio::spawn(async move { runner.run(rule, trigger).await });
        }
    }

    /// 调度时区下的当前时间（分钟精度）。
    fn now_local(&self) -> NaiveDateTime {
        truncate_to_minute(Utc::now().with_timezone(&self.timezone).naive_local())
    }
}

#[async_trait]
impl MessageHandler for RuleEngineService {
    async fn handle(&self, msg: &Message) -> Result<(), MessagingError> {
        self.consume(msg)
            .await
            .map_err(|err| MessagingError::Handler(err.to_string()))
    }

    fn cancel(&self) -> Result<(), MessagingError> {
        Ok(())
    }
}

fn stamp(session: &AuthSession) -> UpdateStamp {
    UpdateStamp {
        updated_at: Utc::now(),
        updated_by: session.user_id.clone(),
    }
}

/// 单条规则的执行上下文，可在任务间复制。
#[derive(Clone)]
struct RuleRunner {
    publisher: Arc<dyn Publisher>,
    scripts: Arc<ScriptRegistry>,
    errors: mpsc::Sender<RuleRunError>,
}

impl RuleRunner {
    async fn run(&self, rule: Rule, msg: Arc<Message>) {
        match self.process(&rule, &msg).await {
            Ok(()) => conduit_telemetry::record_rule_executed(),
            Err(err) => {
                conduit_telemetry::record_rule_failed();
                self.report(rule.id, err);
            }
        }
    }

    async fn process(&self, rule: &Rule, msg: &Message) -> Result<(), RuleError> {
        let executor = self.scripts.get(rule.logic.script_type)?;
        let limit = executor.timeout();
        let source = rule.logic.value.clone();
        let input = msg.clone();
        let task = tokio::task::spawn_blocking(move || executor.execute(&source, &input));
        let joined = match limit {
            // 钩子只在 Lua 指令间触发，回溯型 string.find 之类的 C 调用要靠这里截断；
            // 阻塞线程会继续跑到调用返回，结果被丢弃
            Some(limit) => tokio::time::timeout(limit, task).await.map_err(|_| {
                warn!(target: "conduit.rules", rule_id = %rule.id, timeout_ms = limit.as_millis() as u64, "script_abandoned");
                ScriptError::Timeout
            })?,
            None => task.await,
        };
        let output = joined.map_err(|err| ScriptError::Sandbox(err.to_string()))??;

        let Some(payload) = output else {
            debug!(target: "conduit.rules", rule_id = %rule.id, "rule_without_result");
            return Ok(());
        };
        if rule.output_channel.is_empty() {
            return Ok(());
        }
        let out = Message {
            protocol: RULES_PROTOCOL.to_string(),
            channel: rule.output_channel.clone(),
            subtopic: rule.output_topic.clone(),
            publisher: RULES_PUBLISHER.to_string(),
            payload,
            created: created_now(),
        };
        self.publisher
            .publish(&out.channel, &out)
            .await
            .map_err(|err| RuleError::Publish(err.to_string()))?;
        conduit_telemetry::record_rule_output();
        debug!(
            target: "conduit.rules",
            rule_id = %rule.id,
            output_channel = %out.channel,
            payload_size = out.payload.len(),
            "rule_output_published"
        );
        Ok(())
    }

    fn report(&self, rule_id: String, error: RuleError) {
        match self.errors.try_send(RuleRunError { rule_id, error }) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => warn!(
                target: "conduit.rules",
                rule_id = %dropped.rule_id,
                error = %dropped.error,
                "rule_error_dropped"
            ),
            Err(TrySendError::Closed(dropped)) => debug!(
                target: "conduit.rules",
                rule_id = %dropped.rule_id,
                error = %dropped.error,
                "rule_error_unobserved"
            ),
        }
    }
}
