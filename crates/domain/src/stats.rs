use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 统计查询的时间窗口，两端均可选，作用于 created_at
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn since(from: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }
}

/// 作业聚合统计
///
/// 所有桶都是显式字段：空结果集下每个计数都报告 0，而不是缺键。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobStats {
    pub total: i64,
    pub by_status: StatusCounts,
    pub by_type: TypeCounts,
    pub by_priority: PriorityCounts,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: i64,
    pub running: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
    pub retrying: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeCounts {
    pub cron: i64,
    pub scheduled: i64,
    pub immediate: i64,
    pub recurring: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriorityCounts {
    pub low: i64,
    pub normal: i64,
    pub high: i64,
    pub critical: i64,
}

impl StatusCounts {
    pub fn active(&self) -> i64 {
        self.pending + self.running + self.retrying
    }
    pub fn finished(&self) -> i64 {
        self.completed + self.failed + self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_report_zero_buckets() {
        let stats = JobStats::default();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.by_status.pending, 0);
        assert_eq!(stats.by_status.retrying, 0);
        assert_eq!(stats.by_type.cron, 0);
        assert_eq!(stats.by_priority.critical, 0);
        assert_eq!(stats.by_status.active(), 0);
        assert_eq!(stats.by_status.finished(), 0);
    }
}
