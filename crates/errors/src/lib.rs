use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobFlowError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),
    #[error("作业未找到: {id}")]
    JobNotFound { id: i64 },
    #[error("调度定义未找到: {id}")]
    ScheduleNotFound { id: i64 },
    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },
    #[error("数据验证失败: {0}")]
    Validation(String),
    #[error("分布式锁错误: {0}")]
    Lock(String),
    #[error("消息队列错误: {0}")]
    Queue(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("作业执行错误: {0}")]
    Execution(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type JobFlowResult<T> = Result<T, JobFlowError>;

impl JobFlowError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn job_not_found(id: i64) -> Self {
        Self::JobNotFound { id }
    }
    pub fn schedule_not_found(id: i64) -> Self {
        Self::ScheduleNotFound { id }
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn queue_error<S: Into<String>>(msg: S) -> Self {
        Self::Queue(msg.into())
    }
    pub fn lock_error<S: Into<String>>(msg: S) -> Self {
        Self::Lock(msg.into())
    }
    pub fn execution_error<S: Into<String>>(msg: S) -> Self {
        Self::Execution(msg.into())
    }
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JobFlowError::Database(_)
                | JobFlowError::DatabaseOperation(_)
                | JobFlowError::Queue(_)
                | JobFlowError::Lock(_)
        )
    }
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            JobFlowError::Internal(_) | JobFlowError::Configuration(_)
        )
    }
}

impl From<serde_json::Error> for JobFlowError {
    fn from(err: serde_json::Error) -> Self {
        JobFlowError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for JobFlowError {
    fn from(err: anyhow::Error) -> Self {
        JobFlowError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_not_found_message_contains_id() {
        let err = JobFlowError::job_not_found(4217);
        assert!(err.to_string().contains("4217"));
    }

    #[test]
    fn error_classification() {
        assert!(JobFlowError::Queue("boom".into()).is_retryable());
        assert!(!JobFlowError::Validation("bad".into()).is_retryable());
        assert!(JobFlowError::Configuration("bad".into()).is_fatal());
        assert!(!JobFlowError::JobNotFound { id: 1 }.is_fatal());
    }
}
