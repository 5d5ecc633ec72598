//! 执行队列抽象
//!
//! Dispatcher 与执行层之间唯一的边界：调度侧只投递轻量的
//! `JobMessage`，作业本体始终以 Job Store 为准。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobflow_errors::JobFlowResult;
use serde::{Deserialize, Serialize};

/// 队列消息（作业引用，不携带载荷本体）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    /// 消息ID（uuid），用于日志关联，不落库
    pub id: String,
    pub job_id: i64,
    pub job_name: String,
    pub enqueued_at: DateTime<Utc>,
}

impl JobMessage {
    pub fn new(job_id: i64, job_name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_id,
            job_name: job_name.into(),
            enqueued_at: Utc::now(),
        }
    }
}

/// 入队选项
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// 延迟投递毫秒数，0 表示立即可见
    pub delay_ms: u64,
    /// 队列内优先级提示，具体后端可忽略
    pub priority: Option<u8>,
}

/// 执行队列端口
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// 入队并返回消息ID
    async fn enqueue(
        &self,
        queue: &str,
        message: &JobMessage,
        options: Option<EnqueueOptions>,
    ) -> JobFlowResult<String>;

    /// 非阻塞出队；队列为空返回 None
    async fn dequeue(&self, queue: &str) -> JobFlowResult<Option<JobMessage>>;

    /// 当前可见消息数（延迟中的消息不计入）
    async fn queue_size(&self, queue: &str) -> JobFlowResult<u32>;

    /// 清空队列
    async fn purge(&self, queue: &str) -> JobFlowResult<()>;
}
