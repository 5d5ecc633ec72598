use std::sync::Arc;

use jobflow_domain::entities::{JobStatus, JobType, NewJob};
use jobflow_domain::repositories::JobRepository;
use jobflow_scheduler::RetryScanService;
use jobflow_testing_utils::{JobBuilder, MockJobQueue, MockJobRepository};

/// 人工复活的失败作业：status=failed 但 attempts 未耗尽
fn resurrected_job(id: i64, name: &str, attempts: i32, max_retries: i32) -> jobflow_domain::entities::Job {
    JobBuilder::new()
        .with_id(id)
        .with_name(name)
        .with_status(JobStatus::Failed)
        .with_attempts(attempts, max_retries)
        .build()
}

#[tokio::test]
async fn scan_requeues_jobs_with_retry_budget() {
    let repo = Arc::new(MockJobRepository::with_jobs(vec![
        resurrected_job(1, "sync_orders", 1, 3),
        // attempts == max_retries，重试预算已耗尽
        resurrected_job(2, "sync_orders", 1, 1),
    ]));
    let queue = Arc::new(MockJobQueue::new());

    let service = RetryScanService::new(repo.clone(), queue.clone(), 100);
    let requeued = service.scan_once().await.unwrap();

    assert_eq!(requeued, 1);
    let messages = queue.enqueued_for("sync_orders");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].job_id, 1);
}

#[tokio::test]
async fn scan_with_no_failures_is_a_noop() {
    let repo = Arc::new(MockJobRepository::new());
    let queue = Arc::new(MockJobQueue::new());
    let service = RetryScanService::new(repo, queue.clone(), 100);

    assert_eq!(service.scan_once().await.unwrap(), 0);
    assert_eq!(queue.enqueued_count(), 0);
}

#[tokio::test]
async fn scan_respects_batch_size() {
    let jobs = (1..=5)
        .map(|id| resurrected_job(id, "bulk", 1, 3))
        .collect();
    let repo = Arc::new(MockJobRepository::with_jobs(jobs));
    let queue = Arc::new(MockJobQueue::new());

    let service = RetryScanService::new(repo.clone(), queue.clone(), 2);
    assert_eq!(service.scan_once().await.unwrap(), 2);
}

#[tokio::test]
async fn permanently_failed_job_is_never_rescanned() {
    let repo = Arc::new(MockJobRepository::new());
    let queue = Arc::new(MockJobQueue::new());

    // 处理器侧的永久失败：fail_job(.., false) 同时耗尽预算
    let job = repo
        .create(&NewJob::new("orphaned", JobType::Immediate).with_max_retries(5))
        .await
        .unwrap();
    repo.start_job(job.id).await.unwrap();
    repo.fail_job(job.id, "没有注册处理器: orphaned", false)
        .await
        .unwrap();

    let failed = repo.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.attempts, 5);
    assert_eq!(failed.error.as_deref(), Some("没有注册处理器: orphaned"));

    let service = RetryScanService::new(repo.clone(), queue.clone(), 100);
    assert_eq!(service.scan_once().await.unwrap(), 0);
    assert_eq!(queue.enqueued_count(), 0);
}

#[tokio::test]
async fn retrying_jobs_are_left_to_the_worker() {
    // retrying 状态由 Worker 的消息重投驱动，重试扫描不应插手
    let repo = Arc::new(MockJobRepository::with_jobs(vec![JobBuilder::new()
        .with_id(1)
        .with_name("sync_orders")
        .with_status(JobStatus::Retrying)
        .with_attempts(1, 3)
        .build()]));
    let queue = Arc::new(MockJobQueue::new());

    let service = RetryScanService::new(repo, queue.clone(), 100);
    assert_eq!(service.scan_once().await.unwrap(), 0);
    assert_eq!(queue.enqueued_count(), 0);
}
