//! SQLite 数据库实现（嵌入式部署）

pub mod sqlite_job_repository;
pub mod sqlite_schedule_repository;

pub use sqlite_job_repository::SqliteJobRepository;
pub use sqlite_schedule_repository::SqliteScheduleRepository;

use jobflow_errors::{JobFlowError, JobFlowResult};
use sqlx::SqlitePool;

/// 初始化嵌入式数据库表结构
///
/// 时间戳以 TEXT 存储（chrono 绑定的 RFC3339 格式），created_at 由
/// 代码侧设置以保证两个后端的格式一致。
pub async fn create_tables(pool: &SqlitePool) -> JobFlowResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            job_type TEXT NOT NULL,
            priority TEXT NOT NULL DEFAULT 'normal',
            status TEXT NOT NULL DEFAULT 'pending',
            payload TEXT NOT NULL DEFAULT '{}',
            result TEXT,
            error TEXT,
            attempts INTEGER NOT NULL DEFAULT 0,
            max_retries INTEGER NOT NULL DEFAULT 0,
            scheduled_for TEXT,
            organization_id INTEGER,
            started_at TEXT,
            completed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(JobFlowError::Database)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schedules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            job_name TEXT NOT NULL,
            cron_expression TEXT,
            timezone TEXT NOT NULL DEFAULT 'UTC',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(JobFlowError::Database)?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)")
        .execute(pool)
        .await
        .map_err(JobFlowError::Database)?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_scheduled_for ON jobs(scheduled_for)")
        .execute(pool)
        .await
        .map_err(JobFlowError::Database)?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_organization ON jobs(organization_id)")
        .execute(pool)
        .await
        .map_err(JobFlowError::Database)?;

    Ok(())
}
