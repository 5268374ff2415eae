//! 验证辅助函数
//!
//! - ensure_domain：验证 domain_id 非空
//! - ensure_rule：验证规则入库前的必填字段

use crate::error::StorageError;
use crate::models::Rule;

/// 验证 domain_id 非空
pub fn ensure_domain(domain_id: &str) -> Result<(), StorageError> {
    if domain_id.trim().is_empty() {
        return Err(StorageError::invalid("domain_id required"));
    }
    Ok(())
}

/// 验证规则必填字段
pub fn ensure_rule(rule: &Rule) -> Result<(), StorageError> {
    ensure_domain(&rule.domain_id)?;
    if rule.id.trim().is_empty() {
        return Err(StorageError::invalid("rule id required"));
    }
    if rule.schedule.start_datetime.is_none() {
        return Err(StorageError::invalid("schedule start_datetime required"));
    }
    Ok(())
}
