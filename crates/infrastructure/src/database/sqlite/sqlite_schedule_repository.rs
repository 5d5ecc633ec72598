use async_trait::async_trait;
use chrono::Utc;
use jobflow_domain::{entities::Schedule, repositories::ScheduleRepository};
use jobflow_errors::{JobFlowError, JobFlowResult};
use sqlx::{Row, SqlitePool};
use tracing::debug;

const SCHEDULE_COLUMNS: &str =
    "id, name, job_name, cron_expression, timezone, is_active, created_at, updated_at";

pub struct SqliteScheduleRepository {
    pool: SqlitePool,
}

impl SqliteScheduleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_schedule(row: &sqlx::sqlite::SqliteRow) -> JobFlowResult<Schedule> {
        Ok(Schedule {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            job_name: row.try_get("job_name")?,
            cron_expression: row.try_get("cron_expression")?,
            timezone: row.try_get("timezone")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl ScheduleRepository for SqliteScheduleRepository {
    async fn create(&self, schedule: &Schedule) -> JobFlowResult<Schedule> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO schedules (name, job_name, cron_expression, timezone, is_active, \
                                    created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) \
             RETURNING {SCHEDULE_COLUMNS}"
        ))
        .bind(&schedule.name)
        .bind(&schedule.job_name)
        .bind(&schedule.cron_expression)
        .bind(&schedule.timezone)
        .bind(schedule.is_active)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(JobFlowError::Database)?;

        let created = Self::row_to_schedule(&row)?;
        debug!("调度已创建: {}", created.entity_description());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> JobFlowResult<Option<Schedule>> {
        let row = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(JobFlowError::Database)?;

        match row {
            Some(row) => Ok(Some(Self::row_to_schedule(&row)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, schedule: &Schedule) -> JobFlowResult<()> {
        let result = sqlx::query(
            "UPDATE schedules SET name = $2, job_name = $3, cron_expression = $4, \
                 timezone = $5, is_active = $6, updated_at = $7 \
             WHERE id = $1",
        )
        .bind(schedule.id)
        .bind(&schedule.name)
        .bind(&schedule.job_name)
        .bind(&schedule.cron_expression)
        .bind(&schedule.timezone)
        .bind(schedule.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(JobFlowError::Database)?;

        if result.rows_affected() == 0 {
            return Err(JobFlowError::ScheduleNotFound { id: schedule.id });
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> JobFlowResult<()> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(JobFlowError::Database)?;

        if result.rows_affected() == 0 {
            return Err(JobFlowError::ScheduleNotFound { id });
        }
        Ok(())
    }

    async fn list(&self) -> JobFlowResult<Vec<Schedule>> {
        let rows = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(JobFlowError::Database)?;

        rows.iter().map(Self::row_to_schedule).collect()
    }

    async fn list_schedulable(&self) -> JobFlowResult<Vec<Schedule>> {
        let rows = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules \
             WHERE is_active = TRUE AND cron_expression IS NOT NULL \
             ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(JobFlowError::Database)?;

        rows.iter().map(Self::row_to_schedule).collect()
    }
}
