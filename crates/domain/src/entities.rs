use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use jobflow_errors::JobFlowError;
use serde::{Deserialize, Serialize};

/// 作业实体：一个持久化的异步工作单元
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    /// 逻辑作业种类，例如 "send_email"、"sync_erp"
    pub name: String,
    /// 描述作业的创建方式，而非执行方式
    pub job_type: JobType,
    pub priority: JobPriority,
    pub status: JobStatus,
    /// 不透明负载，仅由消费方解释
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub attempts: i32,
    pub max_retries: i32,
    /// None 表示立即可调度
    pub scheduled_for: Option<DateTime<Utc>>,
    pub organization_id: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
    pub fn is_running(&self) -> bool {
        matches!(self.status, JobStatus::Running)
    }
    pub fn has_retries_left(&self) -> bool {
        self.attempts < self.max_retries
    }
    pub fn entity_description(&self) -> String {
        format!("作业 '{}' (ID: {}, 类型: {})", self.name, self.id, self.job_type.as_str())
    }
}

/// 调度派发的全序比较器：优先级（critical 最先），再按 scheduled_for
/// 升序（None 在前），再按 created_at 升序。`get_pending_jobs` 与
/// `get_retryable_jobs` 的所有实现都必须与此保持一致。
pub fn dispatch_order(a: &Job, b: &Job) -> Ordering {
    a.priority
        .sort_rank()
        .cmp(&b.priority.sort_rank())
        .then_with(|| a.scheduled_for.cmp(&b.scheduled_for))
        .then_with(|| a.created_at.cmp(&b.created_at))
}

/// 创建作业时的输入数据，ID与时间戳由Job Store生成
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    pub name: String,
    pub job_type: JobType,
    pub priority: JobPriority,
    pub payload: serde_json::Value,
    pub max_retries: i32,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub organization_id: Option<i64>,
}

impl NewJob {
    pub fn new(name: impl Into<String>, job_type: JobType) -> Self {
        Self {
            name: name.into(),
            job_type,
            priority: JobPriority::Normal,
            payload: serde_json::json!({}),
            max_retries: 0,
            scheduled_for: None,
            organization_id: None,
        }
    }
    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }
    pub fn with_scheduled_for(mut self, scheduled_for: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(scheduled_for);
        self
    }
    pub fn with_organization_id(mut self, organization_id: i64) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    /// 校验创建数据，枚举域由类型系统保证
    pub fn validate(&self) -> Result<(), JobFlowError> {
        if self.name.trim().is_empty() {
            return Err(JobFlowError::validation_error("作业名称不能为空"));
        }
        if self.max_retries < 0 {
            return Err(JobFlowError::validation_error(format!(
                "max_retries 不能为负数: {}",
                self.max_retries
            )));
        }
        Ok(())
    }
}

/// 作业状态机取值，落库字符串为小写英文（存储/线上兼容）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "running")]
    Running,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "retrying")]
    Retrying,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Retrying => "retrying",
        }
    }
    /// 终态不再允许任何后续迁移
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl FromStr for JobStatus {
    type Err = JobFlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            "retrying" => Ok(JobStatus::Retrying),
            _ => Err(JobFlowError::validation_error(format!(
                "无效的作业状态: {s}"
            ))),
        }
    }
}

/// 作业来源类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobType {
    #[serde(rename = "cron")]
    Cron,
    #[serde(rename = "scheduled")]
    Scheduled,
    #[serde(rename = "immediate")]
    Immediate,
    #[serde(rename = "recurring")]
    Recurring,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Cron => "cron",
            JobType::Scheduled => "scheduled",
            JobType::Immediate => "immediate",
            JobType::Recurring => "recurring",
        }
    }
}

impl FromStr for JobType {
    type Err = JobFlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cron" => Ok(JobType::Cron),
            "scheduled" => Ok(JobType::Scheduled),
            "immediate" => Ok(JobType::Immediate),
            "recurring" => Ok(JobType::Recurring),
            _ => Err(JobFlowError::validation_error(format!(
                "无效的作业类型: {s}"
            ))),
        }
    }
}

/// 作业优先级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobPriority {
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "high")]
    High,
    #[serde(rename = "critical")]
    Critical,
}

impl JobPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPriority::Low => "low",
            JobPriority::Normal => "normal",
            JobPriority::High => "high",
            JobPriority::Critical => "critical",
        }
    }
    /// 派发序：critical=0 … low=3，数值越小越先派发
    pub fn sort_rank(&self) -> i32 {
        match self {
            JobPriority::Critical => 0,
            JobPriority::High => 1,
            JobPriority::Normal => 2,
            JobPriority::Low => 3,
        }
    }
}

impl FromStr for JobPriority {
    type Err = JobFlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(JobPriority::Low),
            "normal" => Ok(JobPriority::Normal),
            "high" => Ok(JobPriority::High),
            "critical" => Ok(JobPriority::Critical),
            _ => Err(JobFlowError::validation_error(format!(
                "无效的作业优先级: {s}"
            ))),
        }
    }
}

/// 周期性作业的持久化调度定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub name: String,
    /// 触发时实例化的作业种类
    pub job_name: String,
    /// None 表示该调度处于惰性状态，不会注册触发器
    pub cron_expression: Option<String>,
    /// IANA 时区名，例如 "Asia/Shanghai"
    pub timezone: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    pub fn new(name: impl Into<String>, job_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // 将由数据库生成
            name: name.into(),
            job_name: job_name.into(),
            cron_expression: None,
            timezone: "UTC".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
    pub fn with_cron(mut self, expression: impl Into<String>) -> Self {
        self.cron_expression = Some(expression.into());
        self
    }
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }
    /// 只有激活且携带cron表达式的调度才可注册触发器
    pub fn is_schedulable(&self) -> bool {
        self.is_active && self.cron_expression.is_some()
    }
    pub fn entity_description(&self) -> String {
        format!("调度 '{}' (ID: {}, 作业: {})", self.name, self.id, self.job_name)
    }
}

macro_rules! impl_sqlx_text_enum {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::Postgres> for $ty {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
            }
        }

        impl sqlx::Type<sqlx::Sqlite> for $ty {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <str as sqlx::Type<sqlx::Sqlite>>::type_info()
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $ty {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                s.parse::<$ty>().map_err(|e| e.to_string().into())
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for $ty {
            fn decode(
                value: sqlx::sqlite::SqliteValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
                s.parse::<$ty>().map_err(|e| e.to_string().into())
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Postgres> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
                <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
            ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
                <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
            }
        }
    };
}

impl_sqlx_text_enum!(JobStatus);
impl_sqlx_text_enum!(JobType);
impl_sqlx_text_enum!(JobPriority);
