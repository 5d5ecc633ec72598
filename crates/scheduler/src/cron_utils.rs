use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::str::FromStr;
use tracing::warn;

use jobflow_errors::{JobFlowError, JobFlowResult};

/// CRON表达式解析与点火时间规划
///
/// 表达式为6/7字段（秒在前），点火时间在调度定义声明的时区内计算，
/// 返回值统一换算为UTC。
pub struct CronPlanner {
    schedule: CronSchedule,
    timezone: Tz,
}

impl CronPlanner {
    pub fn new(cron_expr: &str, timezone: &str) -> JobFlowResult<Self> {
        let schedule = CronSchedule::from_str(cron_expr).map_err(|e| JobFlowError::InvalidCron {
            expr: cron_expr.to_string(),
            message: e.to_string(),
        })?;
        let timezone = match Tz::from_str(timezone) {
            Ok(tz) => tz,
            Err(_) => {
                // 未知时区不让调度失效，退回UTC
                warn!("未知时区 '{}', 退回UTC", timezone);
                Tz::UTC
            }
        };
        Ok(Self { schedule, timezone })
    }

    /// 下一次点火时间（UTC）
    pub fn next_fire(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = from.with_timezone(&self.timezone);
        self.schedule
            .after(&local)
            .next()
            .map(|t| t.with_timezone(&Utc))
    }

    /// 从指定时间开始的多个点火时间（UTC）
    pub fn upcoming_times(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let local = from.with_timezone(&self.timezone);
        self.schedule
            .after(&local)
            .take(count)
            .map(|t| t.with_timezone(&Utc))
            .collect()
    }

    /// 验证CRON表达式是否有效
    pub fn validate_cron_expression(cron_expr: &str) -> JobFlowResult<()> {
        CronSchedule::from_str(cron_expr).map_err(|e| JobFlowError::InvalidCron {
            expr: cron_expr.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}
