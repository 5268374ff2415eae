use chrono::{Datelike, NaiveDateTime, Timelike};
use conduit_storage::{RecurringType, Schedule};

/// 判断规则在 `now`（调度时区本地时间，分钟精度）是否应执行。
///
/// 1. 起始时间晚于 now 时不执行
/// 2. 显式触发时间与 now 在年月日时分上一致时执行
/// 3. 否则按周期类型：自起始时间经过的整天数/整周数/自然月数能被周期整除时执行
///
/// 周期为 0 或类型为 `None` 时不走周期判断。
/// 天数与周数按经过时长（小时）整除计算，跨夏令时或闰日时可能偏移一个周期。
pub fn should_run_rule(schedule: &Schedule, now: NaiveDateTime) -> bool {
    if let Some(start) = schedule.start_datetime
        && start > now
    {
        return false;
    }

    if schedule.recurring_time.iter().any(|time| same_minute(time, &now)) {
        return true;
    }

    let Some(start) = schedule.start_datetime else {
        return false;
    };
    let period = i64::from(schedule.recurring_period);
    if period == 0 {
        return false;
    }
    let elapsed_hours = (now - start).num_hours();
    match schedule.recurring_type {
        RecurringType::Daily => (elapsed_hours / 24) % period == 0,
        RecurringType::Weekly => (elapsed_hours / (24 * 7)) % period == 0,
        RecurringType::Monthly => {
            let months = 12 * i64::from(now.year() - start.year())
                + (i64::from(now.month()) - i64::from(start.month()));
            months % period == 0
        }
        RecurringType::None => false,
    }
}

fn same_minute(left: &NaiveDateTime, right: &NaiveDateTime) -> bool {
    left.year() == right.year()
        && left.month() == right.month()
        && left.day() == right.day()
        && left.hour() == right.hour()
        && left.minute() == right.minute()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_storage::parse_schedule_time;

    fn at(value: &str) -> NaiveDateTime {
        parse_schedule_time(value).expect("time")
    }

    fn schedule(start: &str, recurring_type: RecurringType, period: u32) -> Schedule {
        Schedule {
            start_datetime: Some(at(start)),
            recurring_time: Vec::new(),
            recurring_type,
            recurring_period: period,
        }
    }

    #[test]
    fn daily_period_counts_whole_days() {
        let every_other_day = schedule("2024-01-01T00:00", RecurringType::Daily, 2);
        assert!(should_run_rule(&every_other_day, at("2024-01-05T00:00")));
        assert!(!should_run_rule(&every_other_day, at("2024-01-04T00:00")));
        assert!(should_run_rule(&every_other_day, at("2024-01-01T00:00")));
        assert!(should_run_rule(&every_other_day, at("2024-01-03T23:59")));
    }

    #[test]
    fn weekly_and_monthly_periods() {
        let fortnightly = schedule("2024-01-01T08:00", RecurringType::Weekly, 2);
        assert!(should_run_rule(&fortnightly, at("2024-01-15T08:00")));
        assert!(!should_run_rule(&fortnightly, at("2024-01-08T08:00")));

        let quarterly = schedule("2023-11-10T08:00", RecurringType::Monthly, 3);
        assert!(should_run_rule(&quarterly, at("2024-02-01T00:00")));
        assert!(!should_run_rule(&quarterly, at("2024-01-10T08:00")));
    }

    #[test]
    fn future_start_never_runs() {
        let mut future = schedule("2024-01-01T10:00", RecurringType::Daily, 1);
        future.recurring_time.push(at("2024-01-01T09:00"));
        assert!(!should_run_rule(&future, at("2024-01-01T09:00")));
        for recurring_type in [RecurringType::Weekly, RecurringType::Monthly, RecurringType::None] {
            future.recurring_type = recurring_type;
            assert!(!should_run_rule(&future, at("2024-01-01T09:00")));
        }
    }

    #[test]
    fn explicit_time_bypasses_period() {
        let mut once = schedule("2024-01-01T00:00", RecurringType::None, 0);
        once.recurring_time.push(at("2024-03-02T14:30"));
        assert!(should_run_rule(&once, at("2024-03-02T14:30")));
        assert!(!should_run_rule(&once, at("2024-03-02T14:31")));
        assert!(!should_run_rule(&once, at("2025-03-02T14:30")));
    }

    #[test]
    fn zero_period_skips_periodic_path() {
        for recurring_type in [RecurringType::Daily, RecurringType::Weekly, RecurringType::Monthly] {
            let rule = schedule("2024-01-01T00:00", recurring_type, 0);
            assert!(!should_run_rule(&rule, at("2024-01-01T00:00")));
            assert!(!should_run_rule(&rule, at("2024-06-01T00:00")));
        }
    }
}
