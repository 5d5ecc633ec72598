use chrono::{Duration, Utc};
use jobflow_domain::entities::{JobPriority, JobStatus, JobType, NewJob, Schedule};
use jobflow_domain::repositories::{JobRepository, ScheduleRepository};
use jobflow_domain::stats::TimeRange;
use jobflow_domain::status_update::JobStatusUpdate;
use jobflow_errors::JobFlowError;
use jobflow_infrastructure::database::sqlite::{
    create_tables, SqliteJobRepository, SqliteScheduleRepository,
};
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("打开内存数据库失败");
    create_tables(&pool).await.expect("建表失败");
    pool
}

#[tokio::test]
async fn create_job_starts_pending_with_zero_attempts() {
    let repo = SqliteJobRepository::new(setup_pool().await);

    let job = repo
        .create(
            &NewJob::new("send_email", JobType::Immediate)
                .with_payload(json!({"to": "ops@example.com"})),
        )
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempts, 0);
    assert!(job.started_at.is_none());
    assert!(job.completed_at.is_none());
    assert_eq!(job.payload["to"], "ops@example.com");
}

#[tokio::test]
async fn create_rejects_empty_name() {
    let repo = SqliteJobRepository::new(setup_pool().await);
    let result = repo.create(&NewJob::new("", JobType::Immediate)).await;
    assert!(matches!(result, Err(JobFlowError::Validation { .. })));
}

#[tokio::test]
async fn pending_jobs_ordered_by_priority_rank() {
    let repo = SqliteJobRepository::new(setup_pool().await);

    // 乱序插入，验证排序不依赖插入顺序
    for priority in [
        JobPriority::Low,
        JobPriority::Critical,
        JobPriority::Normal,
        JobPriority::High,
    ] {
        repo.create(&NewJob::new("work", JobType::Immediate).with_priority(priority))
            .await
            .unwrap();
    }

    let jobs = repo.get_pending_jobs(10, None).await.unwrap();
    let priorities: Vec<JobPriority> = jobs.iter().map(|j| j.priority).collect();
    assert_eq!(
        priorities,
        vec![
            JobPriority::Critical,
            JobPriority::High,
            JobPriority::Normal,
            JobPriority::Low
        ]
    );
}

#[tokio::test]
async fn pending_jobs_exclude_future_scheduled_for() {
    let repo = SqliteJobRepository::new(setup_pool().await);

    repo.create(&NewJob::new("later", JobType::Scheduled)
        .with_scheduled_for(Utc::now() + Duration::hours(2)))
        .await
        .unwrap();
    let due = repo
        .create(&NewJob::new("due", JobType::Scheduled)
            .with_scheduled_for(Utc::now() - Duration::hours(2)))
        .await
        .unwrap();
    let immediate = repo
        .create(&NewJob::new("now", JobType::Immediate))
        .await
        .unwrap();

    let jobs = repo.get_pending_jobs(10, None).await.unwrap();
    let ids: Vec<i64> = jobs.iter().map(|j| j.id).collect();
    // 未到期的不返回；无计划时间的排在已到期之前
    assert_eq!(ids, vec![immediate.id, due.id]);
}

#[tokio::test]
async fn pending_jobs_filter_by_organization_and_limit() {
    let repo = SqliteJobRepository::new(setup_pool().await);

    for _ in 0..3 {
        repo.create(&NewJob::new("tenant_a", JobType::Immediate).with_organization_id(1))
            .await
            .unwrap();
    }
    repo.create(&NewJob::new("tenant_b", JobType::Immediate).with_organization_id(2))
        .await
        .unwrap();

    let org1 = repo.get_pending_jobs(10, Some(1)).await.unwrap();
    assert_eq!(org1.len(), 3);
    assert!(org1.iter().all(|j| j.organization_id == Some(1)));

    let capped = repo.get_pending_jobs(2, Some(1)).await.unwrap();
    assert_eq!(capped.len(), 2);

    let all = repo.get_pending_jobs(10, None).await.unwrap();
    assert_eq!(all.len(), 4);
}

#[tokio::test]
async fn start_job_increments_attempts_atomically() {
    let repo = SqliteJobRepository::new(setup_pool().await);
    let job = repo
        .create(&NewJob::new("flaky", JobType::Immediate).with_max_retries(3))
        .await
        .unwrap();

    let running = repo.start_job(job.id).await.unwrap();
    assert_eq!(running.status, JobStatus::Running);
    assert_eq!(running.attempts, 1);
    assert!(running.started_at.is_some());

    repo.fail_job(job.id, "boom", true).await.unwrap();
    let running_again = repo.start_job(job.id).await.unwrap();
    assert_eq!(running_again.attempts, 2);
}

#[tokio::test]
async fn fail_job_routes_between_retrying_and_failed() {
    let repo = SqliteJobRepository::new(setup_pool().await);
    let job = repo
        .create(&NewJob::new("flaky", JobType::Immediate).with_max_retries(2))
        .await
        .unwrap();
    repo.start_job(job.id).await.unwrap();

    let retrying = repo.fail_job(job.id, "timeout", true).await.unwrap();
    assert_eq!(retrying.status, JobStatus::Retrying);
    assert_eq!(retrying.error.as_deref(), Some("timeout"));
    // retrying 非终态，不盖章
    assert!(retrying.completed_at.is_none());

    repo.start_job(job.id).await.unwrap();
    let failed = repo.fail_job(job.id, "timeout again", false).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.completed_at.is_some());
}

#[tokio::test]
async fn complete_job_records_result_and_completed_at() {
    let repo = SqliteJobRepository::new(setup_pool().await);
    let job = repo
        .create(&NewJob::new("report", JobType::Immediate))
        .await
        .unwrap();
    repo.start_job(job.id).await.unwrap();

    let done = repo
        .complete_job(job.id, Some(json!({"rows": 128})))
        .await
        .unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.completed_at.is_some());
    assert_eq!(done.result.unwrap()["rows"], 128);
}

#[tokio::test]
async fn cancel_job_is_terminal_and_stamps_completed_at() {
    let repo = SqliteJobRepository::new(setup_pool().await);
    let job = repo
        .create(&NewJob::new("abort_me", JobType::Immediate))
        .await
        .unwrap();

    let cancelled = repo.cancel_job(job.id).await.unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert!(cancelled.completed_at.is_some());
}

#[tokio::test]
async fn update_status_unknown_id_error_embeds_id() {
    let repo = SqliteJobRepository::new(setup_pool().await);
    let err = repo.start_job(99999).await.unwrap_err();
    assert!(matches!(err, JobFlowError::JobNotFound { id: 99999 }));
    assert!(err.to_string().contains("99999"));
}

#[tokio::test]
async fn retryable_jobs_exclude_exhausted_attempts() {
    let repo = SqliteJobRepository::new(setup_pool().await);

    // 人工复活的失败作业：直接置 failed 而不耗尽预算
    let resurrected = repo
        .create(&NewJob::new("resurrected", JobType::Immediate).with_max_retries(3))
        .await
        .unwrap();
    repo.start_job(resurrected.id).await.unwrap();
    repo.update_status(
        resurrected.id,
        JobStatus::Failed,
        JobStatusUpdate::with_error("err"),
    )
    .await
    .unwrap();

    let exhausted = repo
        .create(&NewJob::new("exhausted", JobType::Immediate).with_max_retries(1))
        .await
        .unwrap();
    repo.start_job(exhausted.id).await.unwrap();
    repo.fail_job(exhausted.id, "err", false).await.unwrap();

    let jobs = repo.get_retryable_jobs(10).await.unwrap();
    let ids: Vec<i64> = jobs.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![resurrected.id]);
}

#[tokio::test]
async fn permanent_failure_exhausts_retry_budget() {
    let repo = SqliteJobRepository::new(setup_pool().await);
    let job = repo
        .create(&NewJob::new("orphaned", JobType::Immediate).with_max_retries(5))
        .await
        .unwrap();
    repo.start_job(job.id).await.unwrap();

    let failed = repo.fail_job(job.id, "没有注册处理器", false).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.attempts, failed.max_retries);
    assert!(repo.get_retryable_jobs(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn stats_report_zero_buckets_on_empty_store() {
    let repo = SqliteJobRepository::new(setup_pool().await);
    let stats = repo.get_stats(None, None).await.unwrap();

    assert_eq!(stats.total, 0);
    assert_eq!(stats.by_status.pending, 0);
    assert_eq!(stats.by_status.failed, 0);
    assert_eq!(stats.by_type.cron, 0);
    assert_eq!(stats.by_priority.critical, 0);
}

#[tokio::test]
async fn stats_aggregate_by_status_type_priority() {
    let repo = SqliteJobRepository::new(setup_pool().await);

    repo.create(&NewJob::new("a", JobType::Cron).with_priority(JobPriority::High))
        .await
        .unwrap();
    let b = repo
        .create(&NewJob::new("b", JobType::Immediate))
        .await
        .unwrap();
    repo.start_job(b.id).await.unwrap();
    repo.complete_job(b.id, None).await.unwrap();

    let stats = repo.get_stats(None, None).await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.by_status.pending, 1);
    assert_eq!(stats.by_status.completed, 1);
    assert_eq!(stats.by_type.cron, 1);
    assert_eq!(stats.by_type.immediate, 1);
    assert_eq!(stats.by_priority.high, 1);
    assert_eq!(stats.by_priority.normal, 1);
}

#[tokio::test]
async fn stats_respect_organization_and_time_range() {
    let repo = SqliteJobRepository::new(setup_pool().await);

    repo.create(&NewJob::new("a", JobType::Immediate).with_organization_id(1))
        .await
        .unwrap();
    repo.create(&NewJob::new("b", JobType::Immediate).with_organization_id(2))
        .await
        .unwrap();

    let org1 = repo.get_stats(Some(1), None).await.unwrap();
    assert_eq!(org1.total, 1);

    let future_only = repo
        .get_stats(None, Some(TimeRange::since(Utc::now() + Duration::hours(1))))
        .await
        .unwrap();
    assert_eq!(future_only.total, 0);
}

#[tokio::test]
async fn schedule_crud_roundtrip() {
    let repo = SqliteScheduleRepository::new(setup_pool().await);

    let created = repo
        .create(&Schedule::new("nightly-report", "generate_report").with_cron("0 0 2 * * *"))
        .await
        .unwrap();
    assert!(created.id > 0);

    let mut fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(fetched.job_name, "generate_report");

    fetched.is_active = false;
    repo.update(&fetched).await.unwrap();
    assert!(repo.list_schedulable().await.unwrap().is_empty());
    assert_eq!(repo.list().await.unwrap().len(), 1);

    repo.delete(created.id).await.unwrap();
    assert!(repo.get_by_id(created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn schedulable_listing_skips_cronless_definitions() {
    let repo = SqliteScheduleRepository::new(setup_pool().await);

    repo.create(&Schedule::new("manual-only", "cleanup"))
        .await
        .unwrap();
    repo.create(&Schedule::new("cron-backed", "cleanup").with_cron("0 */5 * * * *"))
        .await
        .unwrap();

    let schedulable = repo.list_schedulable().await.unwrap();
    assert_eq!(schedulable.len(), 1);
    assert_eq!(schedulable[0].name, "cron-backed");
}

#[tokio::test]
async fn delete_missing_schedule_reports_not_found() {
    let repo = SqliteScheduleRepository::new(setup_pool().await);
    let err = repo.delete(404).await.unwrap_err();
    assert!(matches!(err, JobFlowError::ScheduleNotFound { id: 404 }));
}
