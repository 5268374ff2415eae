//! 规则内存存储实现
//!
//! 用于测试和未配置数据库时的单实例运行。

use crate::error::StorageError;
use crate::models::{Page, PageMeta, Rule, RuleStatus, RuleUpdate, Schedule, UpdateStamp};
use crate::traits::RuleRepository;
use crate::validation::{ensure_domain, ensure_rule};
use std::collections::HashMap;
use std::sync::RwLock;

/// 规则内存存储
///
/// 使用 RwLock + HashMap 提供线程安全的内存存储。
pub struct InMemoryRuleRepository {
    rules: RwLock<HashMap<String, Rule>>,
}

impl InMemoryRuleRepository {
    /// 创建新的规则存储
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(HashMap::new()),
        }
    }

    fn modify<F>(
        &self,
        domain_id: &str,
        rule_id: &str,
        stamp: UpdateStamp,
        apply: F,
    ) -> Result<Option<Rule>, StorageError>
    where
        F: FnOnce(&mut Rule),
    {
        ensure_domain(domain_id)?;
        let mut map = self
            .rules
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let rule = match map.get_mut(rule_id) {
            Some(rule) if rule.domain_id == domain_id => rule,
            _ => return Ok(None),
        };
        apply(rule);
        rule.updated_at = Some(stamp.updated_at);
        rule.updated_by = Some(stamp.updated_by);
        Ok(Some(rule.clone()))
    }
}

impl Default for InMemoryRuleRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_page(rule: &Rule, page: &PageMeta) -> bool {
    if let Some(domain_id) = page.domain_id.as_deref() {
        if rule.domain_id != domain_id {
            return false;
        }
    }
    if let Some(name) = page.name.as_deref() {
        if !rule.name.to_lowercase().contains(&name.to_lowercase()) {
            return false;
        }
    }
    if let Some(channel) = page.input_channel.as_deref() {
        if rule.input_channel != channel {
            return false;
        }
    }
    if let Some(channel) = page.output_channel.as_deref() {
        if rule.output_channel != channel {
            return false;
        }
    }
    if let Some(status) = page.status {
        if rule.status != status {
            return false;
        }
    }
    if let Some(recurring_type) = page.recurring_type {
        if rule.schedule.recurring_type != recurring_type {
            return false;
        }
    }
    let start = rule.schedule.start_datetime;
    if let Some(before) = page.scheduled_before {
        if !matches!(start, Some(start) if start <= before) {
            return false;
        }
    }
    if let Some(after) = page.scheduled_after {
        if !matches!(start, Some(start) if start >= after) {
            return false;
        }
    }
    true
}

#[async_trait::async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn add_rule(&self, rule: Rule) -> Result<Rule, StorageError> {
        ensure_rule(&rule)?;
        let mut map = self
            .rules
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if map.contains_key(&rule.id) {
            return Err(StorageError::conflict("rule exists"));
        }
        map.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    async fn view_rule(
        &self,
        domain_id: &str,
        rule_id: &str,
    ) -> Result<Option<Rule>, StorageError> {
        ensure_domain(domain_id)?;
        let item = self
            .rules
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .get(rule_id)
            .cloned()
            .filter(|rule| rule.domain_id == domain_id);
        Ok(item)
    }

    async fn update_rule(
        &self,
        domain_id: &str,
        rule_id: &str,
        update: RuleUpdate,
        stamp: UpdateStamp,
    ) -> Result<Option<Rule>, StorageError> {
        self.modify(domain_id, rule_id, stamp, |rule| {
            if let Some(name) = update.name {
                rule.name = name;
            }
            if let Some(metadata) = update.metadata {
                rule.metadata = metadata;
            }
            if let Some(input_channel) = update.input_channel {
                rule.input_channel = input_channel;
            }
            if let Some(input_topic) = update.input_topic {
                rule.input_topic = input_topic;
            }
            if let Some(logic) = update.logic {
                rule.logic = logic;
            }
            if let Some(output_channel) = update.output_channel {
                rule.output_channel = output_channel;
            }
            if let Some(output_topic) = update.output_topic {
                rule.output_topic = output_topic;
            }
        })
    }

    async fn update_rule_schedule(
        &self,
        domain_id: &str,
        rule_id: &str,
        schedule: Schedule,
        stamp: UpdateStamp,
    ) -> Result<Option<Rule>, StorageError> {
        self.modify(domain_id, rule_id, stamp, |rule| {
            // 未提供起点时保留原起点
            let start = schedule.start_datetime.or(rule.schedule.start_datetime);
            rule.schedule = Schedule {
                start_datetime: start,
                ..schedule
            };
        })
    }

    async fn update_rule_status(
        &self,
        domain_id: &str,
        rule_id: &str,
        status: RuleStatus,
        stamp: UpdateStamp,
    ) -> Result<Option<Rule>, StorageError> {
        self.modify(domain_id, rule_id, stamp, |rule| rule.status = status)
    }

    async fn remove_rule(&self, domain_id: &str, rule_id: &str) -> Result<bool, StorageError> {
        ensure_domain(domain_id)?;
        let mut map = self
            .rules
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        match map.get(rule_id) {
            Some(rule) if rule.domain_id == domain_id => {
                map.remove(rule_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_rules(&self, page: &PageMeta) -> Result<Page, StorageError> {
        let map = self
            .rules
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<Rule> = map
            .values()
            .filter(|rule| matches_page(rule, page))
            .cloned()
            .collect();
        drop(map);
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let total = items.len() as u64;
        let offset = page.offset.min(total) as usize;
        let mut rules = items.split_off(offset);
        if page.limit > 0 {
            rules.truncate(page.limit as usize);
        }
        Ok(Page {
            total,
            offset: page.offset,
            limit: page.limit,
            rules,
        })
    }
}
