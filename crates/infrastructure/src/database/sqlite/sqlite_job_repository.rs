use async_trait::async_trait;
use chrono::Utc;
use jobflow_domain::{
    entities::{Job, JobStatus, NewJob},
    repositories::JobRepository,
    stats::{JobStats, PriorityCounts, StatusCounts, TimeRange, TypeCounts},
    status_update::JobStatusUpdate,
};
use jobflow_errors::{JobFlowError, JobFlowResult};
use sqlx::{Row, SqlitePool};
use tracing::debug;

const JOB_COLUMNS: &str = "id, name, job_type, priority, status, payload, result, error, \
     attempts, max_retries, scheduled_for, organization_id, \
     started_at, completed_at, created_at, updated_at";

/// 派发排序：critical 最先，scheduled_for 为空的排在已到期之前
const DISPATCH_ORDER: &str = "CASE priority \
         WHEN 'critical' THEN 0 WHEN 'high' THEN 1 \
         WHEN 'normal' THEN 2 ELSE 3 END, \
     scheduled_for IS NOT NULL, scheduled_for ASC, created_at ASC";

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> JobFlowResult<Job> {
        let payload: String = row.try_get("payload")?;
        let result: Option<String> = row.try_get("result")?;
        Ok(Job {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            job_type: row.try_get("job_type")?,
            priority: row.try_get("priority")?,
            status: row.try_get("status")?,
            payload: serde_json::from_str(&payload)?,
            result: result.map(|r| serde_json::from_str(&r)).transpose()?,
            error: row.try_get("error")?,
            attempts: row.try_get("attempts")?,
            max_retries: row.try_get("max_retries")?,
            scheduled_for: row.try_get("scheduled_for")?,
            organization_id: row.try_get("organization_id")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn create(&self, job: &NewJob) -> JobFlowResult<Job> {
        job.validate()?;
        let now = Utc::now();

        let row = sqlx::query(&format!(
            "INSERT INTO jobs (name, job_type, priority, status, payload, attempts, max_retries, \
                               scheduled_for, organization_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, 0, $6, $7, $8, $9, $9) \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(&job.name)
        .bind(job.job_type)
        .bind(job.priority)
        .bind(JobStatus::Pending)
        .bind(job.payload.to_string())
        .bind(job.max_retries)
        .bind(job.scheduled_for)
        .bind(job.organization_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(JobFlowError::Database)?;

        let created = Self::row_to_job(&row)?;
        debug!("作业已创建: {}", created.entity_description());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> JobFlowResult<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(JobFlowError::Database)?;

        match row {
            Some(row) => Ok(Some(Self::row_to_job(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_by_status(&self, status: JobStatus, limit: i64) -> JobFlowResult<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status = $1 \
             ORDER BY created_at ASC LIMIT $2"
        ))
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(JobFlowError::Database)?;

        rows.iter().map(Self::row_to_job).collect()
    }

    async fn get_pending_jobs(
        &self,
        limit: i64,
        organization_id: Option<i64>,
    ) -> JobFlowResult<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs \
             WHERE status = 'pending' \
               AND (scheduled_for IS NULL OR scheduled_for <= $1) \
               AND ($2 IS NULL OR organization_id = $2) \
             ORDER BY {DISPATCH_ORDER} LIMIT $3"
        ))
        .bind(Utc::now())
        .bind(organization_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(JobFlowError::Database)?;

        rows.iter().map(Self::row_to_job).collect()
    }

    async fn get_retryable_jobs(&self, limit: i64) -> JobFlowResult<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs \
             WHERE status = 'failed' AND attempts < max_retries \
             ORDER BY {DISPATCH_ORDER} LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(JobFlowError::Database)?;

        rows.iter().map(Self::row_to_job).collect()
    }

    async fn update_status(
        &self,
        id: i64,
        status: JobStatus,
        update: JobStatusUpdate,
    ) -> JobFlowResult<Job> {
        let mut tx = self.pool.begin().await.map_err(JobFlowError::Database)?;

        // 事务内先确认行存在，避免与并发删除竞争
        let existing = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(JobFlowError::Database)?;

        let current = match existing {
            Some(row) => Self::row_to_job(&row)?,
            None => return Err(JobFlowError::JobNotFound { id }),
        };

        let now = Utc::now();
        let mut attempts = if update.increment_attempts {
            current.attempts + 1
        } else {
            current.attempts
        };
        if update.exhaust_attempts {
            attempts = attempts.max(current.max_retries);
        }
        // 终态自动盖章，非终态清空，保持 completed_at 与终态一一对应
        let completed_at = if status.is_terminal() {
            update.completed_at.or(Some(now))
        } else {
            update.completed_at
        };
        let started_at = update.started_at.or(current.started_at);
        let result = update.result.or(current.result);
        let error = update.error.or(current.error);

        let row = sqlx::query(&format!(
            "UPDATE jobs SET status = $2, result = $3, error = $4, attempts = $5, \
                 started_at = $6, completed_at = $7, updated_at = $8 \
             WHERE id = $1 RETURNING {JOB_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .bind(result.map(|r| r.to_string()))
        .bind(error)
        .bind(attempts)
        .bind(started_at)
        .bind(completed_at)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(JobFlowError::Database)?;

        tx.commit().await.map_err(JobFlowError::Database)?;

        let updated = Self::row_to_job(&row)?;
        debug!(
            "作业状态已更新: id={} {} -> {}",
            id,
            current.status.as_str(),
            updated.status.as_str()
        );
        Ok(updated)
    }

    async fn get_stats(
        &self,
        organization_id: Option<i64>,
        time_range: Option<TimeRange>,
    ) -> JobFlowResult<JobStats> {
        let (from, to) = match time_range {
            Some(range) => (range.from, range.to),
            None => (None, None),
        };

        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) as total,
                COUNT(CASE WHEN status = 'pending' THEN 1 END) as pending,
                COUNT(CASE WHEN status = 'running' THEN 1 END) as running,
                COUNT(CASE WHEN status = 'completed' THEN 1 END) as completed,
                COUNT(CASE WHEN status = 'failed' THEN 1 END) as failed,
                COUNT(CASE WHEN status = 'cancelled' THEN 1 END) as cancelled,
                COUNT(CASE WHEN status = 'retrying' THEN 1 END) as retrying,
                COUNT(CASE WHEN job_type = 'cron' THEN 1 END) as type_cron,
                COUNT(CASE WHEN job_type = 'scheduled' THEN 1 END) as type_scheduled,
                COUNT(CASE WHEN job_type = 'immediate' THEN 1 END) as type_immediate,
                COUNT(CASE WHEN job_type = 'recurring' THEN 1 END) as type_recurring,
                COUNT(CASE WHEN priority = 'low' THEN 1 END) as prio_low,
                COUNT(CASE WHEN priority = 'normal' THEN 1 END) as prio_normal,
                COUNT(CASE WHEN priority = 'high' THEN 1 END) as prio_high,
                COUNT(CASE WHEN priority = 'critical' THEN 1 END) as prio_critical
            FROM jobs
            WHERE ($1 IS NULL OR organization_id = $1)
              AND ($2 IS NULL OR created_at >= $2)
              AND ($3 IS NULL OR created_at <= $3)
            "#,
        )
        .bind(organization_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(JobFlowError::Database)?;

        Ok(JobStats {
            total: row.try_get("total")?,
            by_status: StatusCounts {
                pending: row.try_get("pending")?,
                running: row.try_get("running")?,
                completed: row.try_get("completed")?,
                failed: row.try_get("failed")?,
                cancelled: row.try_get("cancelled")?,
                retrying: row.try_get("retrying")?,
            },
            by_type: TypeCounts {
                cron: row.try_get("type_cron")?,
                scheduled: row.try_get("type_scheduled")?,
                immediate: row.try_get("type_immediate")?,
                recurring: row.try_get("type_recurring")?,
            },
            by_priority: PriorityCounts {
                low: row.try_get("prio_low")?,
                normal: row.try_get("prio_normal")?,
                high: row.try_get("prio_high")?,
                critical: row.try_get("prio_critical")?,
            },
        })
    }
}
