//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则。`JobRepository` 是系统
//! 其余部分唯一允许依赖的作业契约；状态机语义（start/complete/fail/
//! cancel）以提供方法的形式落在 trait 上，保证所有后端共享同一套迁移
//! 规则。

use async_trait::async_trait;
use chrono::Utc;
use jobflow_errors::JobFlowResult;

use crate::entities::{Job, JobStatus, NewJob, Schedule};
use crate::stats::{JobStats, TimeRange};
use crate::status_update::JobStatusUpdate;

/// 作业仓储抽象（Job Store）
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// 插入新作业，初始 status=pending、attempts=0；数据非法时返回
    /// Validation 错误
    async fn create(&self, job: &NewJob) -> JobFlowResult<Job>;

    /// 按ID查询；不存在返回 None，调用方自行处理缺失
    async fn get_by_id(&self, id: i64) -> JobFlowResult<Option<Job>>;

    /// 按状态查询，按创建时间升序，capped at limit
    async fn get_by_status(&self, status: JobStatus, limit: i64) -> JobFlowResult<Vec<Job>>;

    /// 待派发作业：status=pending 且 (scheduled_for 为空或已到期)，
    /// 可选按租户过滤，按 `dispatch_order` 排序
    async fn get_pending_jobs(
        &self,
        limit: i64,
        organization_id: Option<i64>,
    ) -> JobFlowResult<Vec<Job>>;

    /// 可重试作业：status=failed 且 attempts < max_retries，同一排序；
    /// 重试次数耗尽的作业被永久排除
    async fn get_retryable_jobs(&self, limit: i64) -> JobFlowResult<Vec<Job>>;

    /// 唯一的底层变更原语
    ///
    /// 在事务内先重读行确认存在（防止与并发删除竞争），缺失时返回
    /// `JobNotFound`（错误信息包含ID）。总是盖章 updated_at；新状态为
    /// 终态时自动盖章 completed_at（调用方显式提供则优先），非终态时
    /// 清空 completed_at 以维持 “completed_at 非空 iff 终态” 不变量。
    async fn update_status(
        &self,
        id: i64,
        status: JobStatus,
        update: JobStatusUpdate,
    ) -> JobFlowResult<Job>;

    /// 单条聚合查询的统计，所有桶在空集下报告 0
    async fn get_stats(
        &self,
        organization_id: Option<i64>,
        time_range: Option<TimeRange>,
    ) -> JobFlowResult<JobStats>;

    /// pending|retrying -> running；attempts 在库内原子 +1
    async fn start_job(&self, id: i64) -> JobFlowResult<Job> {
        self.update_status(id, JobStatus::Running, JobStatusUpdate::started(Utc::now()))
            .await
    }

    /// running -> completed，记录结果
    async fn complete_job(&self, id: i64, result: Option<serde_json::Value>) -> JobFlowResult<Job> {
        let update = JobStatusUpdate {
            result,
            ..JobStatusUpdate::default()
        };
        self.update_status(id, JobStatus::Completed, update).await
    }

    /// running -> retrying（should_retry）或 failed；completed_at 只在
    /// 不重试的终态分支盖章。永久失败同时耗尽重试预算，防止重试扫描
    /// 把它重新捞起来
    async fn fail_job(&self, id: i64, error: &str, should_retry: bool) -> JobFlowResult<Job> {
        let (status, update) = if should_retry {
            (JobStatus::Retrying, JobStatusUpdate::with_error(error))
        } else {
            (
                JobStatus::Failed,
                JobStatusUpdate::with_error(error).exhausted(),
            )
        };
        self.update_status(id, status, update).await
    }

    /// 无条件置为 cancelled 并盖章 completed_at，对已终态作业同样生效
    async fn cancel_job(&self, id: i64) -> JobFlowResult<Job> {
        self.update_status(id, JobStatus::Cancelled, JobStatusUpdate::none())
            .await
    }
}

/// 调度定义仓储抽象
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn create(&self, schedule: &Schedule) -> JobFlowResult<Schedule>;
    async fn get_by_id(&self, id: i64) -> JobFlowResult<Option<Schedule>>;
    async fn update(&self, schedule: &Schedule) -> JobFlowResult<()>;
    async fn delete(&self, id: i64) -> JobFlowResult<()>;
    async fn list(&self) -> JobFlowResult<Vec<Schedule>>;
    /// 调度器启动时加载：is_active 且 cron_expression 非空
    async fn list_schedulable(&self) -> JobFlowResult<Vec<Schedule>>;
}
