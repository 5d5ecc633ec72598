//! PostgreSQL 数据库实现（生产部署）

pub mod postgres_job_repository;
pub mod postgres_schedule_repository;

pub use postgres_job_repository::PostgresJobRepository;
pub use postgres_schedule_repository::PostgresScheduleRepository;

use jobflow_errors::{JobFlowError, JobFlowResult};
use sqlx::PgPool;

/// 初始化表结构（无迁移工具的部署场景使用）
pub async fn create_tables(pool: &PgPool) -> JobFlowResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            job_type VARCHAR(20) NOT NULL,
            priority VARCHAR(20) NOT NULL DEFAULT 'normal',
            status VARCHAR(20) NOT NULL DEFAULT 'pending',
            payload JSONB NOT NULL DEFAULT '{}',
            result JSONB,
            error TEXT,
            attempts INTEGER NOT NULL DEFAULT 0,
            max_retries INTEGER NOT NULL DEFAULT 0,
            scheduled_for TIMESTAMPTZ,
            organization_id BIGINT,
            started_at TIMESTAMPTZ,
            completed_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(JobFlowError::Database)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schedules (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            job_name TEXT NOT NULL,
            cron_expression TEXT,
            timezone TEXT NOT NULL DEFAULT 'UTC',
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(JobFlowError::Database)?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_jobs_pending \
         ON jobs(status, scheduled_for) WHERE status = 'pending'",
    )
    .execute(pool)
    .await
    .map_err(JobFlowError::Database)?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_organization ON jobs(organization_id)")
        .execute(pool)
        .await
        .map_err(JobFlowError::Database)?;

    Ok(())
}
