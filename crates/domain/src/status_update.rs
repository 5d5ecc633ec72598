use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `update_status` 携带的字段级变更描述
///
/// 未设置的字段保持原值不动；`completed_at` 的终态自动盖章规则由
/// Job Store 实现负责（见 `JobRepository::update_status` 的约定）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobStatusUpdate {
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    /// 显式提供时优先于终态自动盖章
    pub completed_at: Option<DateTime<Utc>>,
    /// 为真时在库内原子执行 attempts = attempts + 1
    pub increment_attempts: bool,
    /// 为真时把 attempts 抬到 max_retries，使作业不再满足可重试条件
    pub exhaust_attempts: bool,
}

impl JobStatusUpdate {
    pub fn none() -> Self {
        Self::default()
    }
    pub fn with_result(result: serde_json::Value) -> Self {
        Self {
            result: Some(result),
            ..Self::default()
        }
    }
    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
    pub fn exhausted(mut self) -> Self {
        self.exhaust_attempts = true;
        self
    }
    pub fn started(at: DateTime<Utc>) -> Self {
        Self {
            started_at: Some(at),
            increment_attempts: true,
            ..Self::default()
        }
    }
}
