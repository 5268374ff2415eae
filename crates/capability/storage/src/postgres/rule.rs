//! Postgres 规则存储实现
//!
//! 设计要点：
//! - 所有单条操作都带 domain_id 过滤
//! - 列表查询按 PageMeta 动态拼接条件，值全部参数绑定

use crate::error::StorageError;
use crate::models::{
    Page, PageMeta, Rule, RuleStatus, RuleUpdate, Schedule, Script, UpdateStamp,
};
use crate::traits::RuleRepository;
use crate::validation::{ensure_domain, ensure_rule};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

const RULE_COLUMNS: &str = "id, name, domain_id, metadata, input_channel, input_topic, \
     logic_type, logic_value, output_channel, output_topic, start_datetime, recurring_time, \
     recurring_type, recurring_period, status, created_at, created_by, updated_at, updated_by";

pub struct PgRuleRepository {
    pub pool: PgPool,
}

impl PgRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

fn rule_from_row(row: &PgRow) -> Result<Rule, StorageError> {
    let metadata: Json<Map<String, Value>> = row.try_get("metadata")?;
    let logic_type: String = row.try_get("logic_type")?;
    let recurring_type: String = row.try_get("recurring_type")?;
    let recurring_period: i32 = row.try_get("recurring_period")?;
    let status: String = row.try_get("status")?;
    Ok(Rule {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        domain_id: row.try_get("domain_id")?,
        metadata: metadata.0,
        input_channel: row.try_get("input_channel")?,
        input_topic: row.try_get("input_topic")?,
        logic: Script {
            script_type: logic_type.parse()?,
            value: row.try_get("logic_value")?,
        },
        output_channel: row.try_get("output_channel")?,
        output_topic: row.try_get("output_topic")?,
        schedule: Schedule {
            start_datetime: row.try_get("start_datetime")?,
            recurring_time: row.try_get("recurring_time")?,
            recurring_type: recurring_type.parse()?,
            recurring_period: u32::try_from(recurring_period).unwrap_or(0),
        },
        status: status.parse()?,
        created_at: row.try_get("created_at")?,
        created_by: row.try_get("created_by")?,
        updated_at: row.try_get("updated_at")?,
        updated_by: row.try_get("updated_by")?,
    })
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, page: &PageMeta) {
    builder.push(" where true");
    if let Some(domain_id) = page.domain_id.clone() {
        builder.push(" and domain_id = ").push_bind(domain_id);
    }
    if let Some(name) = page.name.as_deref() {
        builder
            .push(" and name ilike ")
            .push_bind(format!("%{}%", name));
    }
    if let Some(channel) = page.input_channel.clone() {
        builder.push(" and input_channel = ").push_bind(channel);
    }
    if let Some(channel) = page.output_channel.clone() {
        builder.push(" and output_channel = ").push_bind(channel);
    }
    if let Some(status) = page.status {
        builder.push(" and status = ").push_bind(status.as_str());
    }
    if let Some(recurring_type) = page.recurring_type {
        builder
            .push(" and recurring_type = ")
            .push_bind(recurring_type.as_str());
    }
    if let Some(before) = page.scheduled_before {
        builder.push(" and start_datetime <= ").push_bind(before);
    }
    if let Some(after) = page.scheduled_after {
        builder.push(" and start_datetime >= ").push_bind(after);
    }
}

#[async_trait::async_trait]
impl RuleRepository for PgRuleRepository {
    async fn add_rule(&self, rule: Rule) -> Result<Rule, StorageError> {
        ensure_rule(&rule)?;
        sqlx::query(
            "insert into rules (id, name, domain_id, metadata, input_channel, input_topic, \
             logic_type, logic_value, output_channel, output_topic, start_datetime, \
             recurring_time, recurring_type, recurring_period, status, created_at, created_by) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(&rule.id)
        .bind(&rule.name)
        .bind(&rule.domain_id)
        .bind(Json(&rule.metadata))
        .bind(&rule.input_channel)
        .bind(&rule.input_topic)
        .bind(rule.logic.script_type.as_str())
        .bind(&rule.logic.value)
        .bind(&rule.output_channel)
        .bind(&rule.output_topic)
        .bind(rule.schedule.start_datetime)
        .bind(&rule.schedule.recurring_time)
        .bind(rule.schedule.recurring_type.as_str())
        .bind(i32::try_from(rule.schedule.recurring_period).unwrap_or(i32::MAX))
        .bind(rule.status.as_str())
        .bind(rule.created_at)
        .bind(&rule.created_by)
        .execute(&self.pool)
        .await?;
        Ok(rule)
    }

    async fn view_rule(
        &self,
        domain_id: &str,
        rule_id: &str,
    ) -> Result<Option<Rule>, StorageError> {
        ensure_domain(domain_id)?;
        let row = sqlx::query(&format!(
            "select {RULE_COLUMNS} from rules where domain_id = $1 and id = $2"
        ))
        .bind(domain_id)
        .bind(rule_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(rule_from_row(&row)?))
    }

    async fn update_rule(
        &self,
        domain_id: &str,
        rule_id: &str,
        update: RuleUpdate,
        stamp: UpdateStamp,
    ) -> Result<Option<Rule>, StorageError> {
        ensure_domain(domain_id)?;
        let (logic_type, logic_value) = match update.logic {
            Some(logic) => (Some(logic.script_type.as_str()), Some(logic.value)),
            None => (None, None),
        };
        let row = sqlx::query(&format!(
            "update rules set \
             name = coalesce($1, name), \
             metadata = coalesce($2, metadata), \
             input_channel = coalesce($3, input_channel), \
             input_topic = coalesce($4, input_topic), \
             logic_type = coalesce($5, logic_type), \
             logic_value = coalesce($6, logic_value), \
             output_channel = coalesce($7, output_channel), \
             output_topic = coalesce($8, output_topic), \
             updated_at = $9, updated_by = $10 \
             where domain_id = $11 and id = $12 \
             returning {RULE_COLUMNS}"
        ))
        .bind(update.name)
        .bind(update.metadata.map(Json))
        .bind(update.input_channel)
        .bind(update.input_topic)
        .bind(logic_type)
        .bind(logic_value)
        .bind(update.output_channel)
        .bind(update.output_topic)
        .bind(stamp.updated_at)
        .bind(stamp.updated_by)
        .bind(domain_id)
        .bind(rule_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(rule_from_row(&row)?))
    }

    async fn update_rule_schedule(
        &self,
        domain_id: &str,
        rule_id: &str,
        schedule: Schedule,
        stamp: UpdateStamp,
    ) -> Result<Option<Rule>, StorageError> {
        ensure_domain(domain_id)?;
        let row = sqlx::query(&format!(
            "update rules set \
             start_datetime = coalesce($1, start_datetime), \
             recurring_time = $2, recurring_type = $3, recurring_period = $4, \
             updated_at = $5, updated_by = $6 \
             where domain_id = $7 and id = $8 \
             returning {RULE_COLUMNS}"
        ))
        .bind(schedule.start_datetime)
        .bind(&schedule.recurring_time)
        .bind(schedule.recurring_type.as_str())
        .bind(i32::try_from(schedule.recurring_period).unwrap_or(i32::MAX))
        .bind(stamp.updated_at)
        .bind(stamp.updated_by)
        .bind(domain_id)
        .bind(rule_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(rule_from_row(&row)?))
    }

    async fn update_rule_status(
        &self,
        domain_id: &str,
        rule_id: &str,
        status: RuleStatus,
        stamp: UpdateStamp,
    ) -> Result<Option<Rule>, StorageError> {
        ensure_domain(domain_id)?;
        let row = sqlx::query(&format!(
            "update rules set status = $1, updated_at = $2, updated_by = $3 \
             where domain_id = $4 and id = $5 \
             returning {RULE_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(stamp.updated_at)
        .bind(stamp.updated_by)
        .bind(domain_id)
        .bind(rule_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(rule_from_row(&row)?))
    }

    async fn remove_rule(&self, domain_id: &str, rule_id: &str) -> Result<bool, StorageError> {
        ensure_domain(domain_id)?;
        let result = sqlx::query("delete from rules where domain_id = $1 and id = $2")
            .bind(domain_id)
            .bind(rule_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_rules(&self, page: &PageMeta) -> Result<Page, StorageError> {
        let mut count = QueryBuilder::<Postgres>::new("select count(*) as total from rules");
        push_filters(&mut count, page);
        let total: i64 = count
            .build()
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;

        let mut query = QueryBuilder::<Postgres>::new(format!("select {RULE_COLUMNS} from rules"));
        push_filters(&mut query, page);
        query.push(" order by created_at, id");
        if page.limit > 0 {
            query
                .push(" limit ")
                .push_bind(i64::try_from(page.limit).unwrap_or(i64::MAX));
        }
        query
            .push(" offset ")
            .push_bind(i64::try_from(page.offset).unwrap_or(i64::MAX));
        let rows = query.build().fetch_all(&self.pool).await?;
        let mut rules = Vec::with_capacity(rows.len());
        for row in &rows {
            rules.push(rule_from_row(row)?);
        }
        Ok(Page {
            total: u64::try_from(total).unwrap_or(0),
            offset: page.offset,
            limit: page.limit,
            rules,
        })
    }
}
