use std::sync::Arc;

use async_trait::async_trait;
use jobflow_domain::entities::{Job, JobStatus, JobType, NewJob};
use jobflow_domain::messaging::{JobMessage, JobQueue};
use jobflow_domain::repositories::JobRepository;
use jobflow_errors::{JobFlowError, JobFlowResult};
use jobflow_testing_utils::{MockJobQueue, MockJobRepository};
use jobflow_worker::{process_message, JobHandler, JobHandlerRegistry, LoggingJobHandler};
use serde_json::{json, Value};

struct FailingHandler;

#[async_trait]
impl JobHandler for FailingHandler {
    fn name(&self) -> &str {
        "always_fails"
    }
    async fn execute(&self, _job: &Job) -> JobFlowResult<Value> {
        Err(JobFlowError::execution_error("外部服务超时"))
    }
}

struct EchoHandler;

#[async_trait]
impl JobHandler for EchoHandler {
    fn name(&self) -> &str {
        "echo"
    }
    async fn execute(&self, job: &Job) -> JobFlowResult<Value> {
        Ok(json!({ "echo": job.payload }))
    }
}

async fn registry_with(handlers: Vec<Arc<dyn JobHandler>>) -> JobHandlerRegistry {
    let registry = JobHandlerRegistry::new();
    for handler in handlers {
        registry.register(handler).await;
    }
    registry
}

#[tokio::test]
async fn successful_execution_completes_job_with_result() {
    let repo = MockJobRepository::new();
    let queue = MockJobQueue::new();
    let registry = registry_with(vec![Arc::new(EchoHandler)]).await;

    let job = repo
        .create(&NewJob::new("echo", JobType::Immediate).with_payload(json!({"k": "v"})))
        .await
        .unwrap();
    process_message(&repo, &registry, &queue, &JobMessage::new(job.id, "echo")).await;

    let done = repo.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.attempts, 1);
    assert!(done.started_at.is_some());
    assert!(done.completed_at.is_some());
    assert_eq!(done.result.unwrap()["echo"]["k"], "v");
    assert_eq!(queue.enqueued_count(), 0);
}

#[tokio::test]
async fn failure_with_budget_goes_to_retrying_and_requeues() {
    let repo = MockJobRepository::new();
    let queue = MockJobQueue::new();
    let registry = registry_with(vec![Arc::new(FailingHandler)]).await;

    let job = repo
        .create(&NewJob::new("always_fails", JobType::Immediate).with_max_retries(2))
        .await
        .unwrap();
    process_message(
        &repo,
        &registry,
        &queue,
        &JobMessage::new(job.id, "always_fails"),
    )
    .await;

    let after_first = repo.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(after_first.status, JobStatus::Retrying);
    assert_eq!(after_first.attempts, 1);
    assert!(after_first.completed_at.is_none());

    // retrying 的作业必须伴随一条重新投递的消息，否则无人驱动下一次执行
    let requeued = queue.enqueued_for("always_fails");
    assert_eq!(requeued.len(), 1);
    assert_eq!(requeued[0].job_id, job.id);

    // 消费重投的消息，第二次执行耗尽预算，进入永久失败
    let retry_message = queue.dequeue("always_fails").await.unwrap().unwrap();
    process_message(&repo, &registry, &queue, &retry_message).await;
    let after_second = repo.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(after_second.status, JobStatus::Failed);
    assert_eq!(after_second.attempts, 2);
    assert!(after_second.completed_at.is_some());
    assert!(after_second.error.unwrap().contains("外部服务超时"));

    // 预算耗尽后不再重投
    assert!(queue.dequeue("always_fails").await.unwrap().is_none());
}

#[tokio::test]
async fn missing_handler_fails_job_permanently() {
    let repo = MockJobRepository::new();
    let queue = MockJobQueue::new();
    let registry = JobHandlerRegistry::new();

    let job = repo
        .create(&NewJob::new("no_such_handler", JobType::Immediate).with_max_retries(5))
        .await
        .unwrap();
    process_message(
        &repo,
        &registry,
        &queue,
        &JobMessage::new(job.id, "no_such_handler"),
    )
    .await;

    let failed = repo.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error.unwrap().contains("no_such_handler"));

    // 永久失败耗尽预算，不会再被可重试查询捞起
    assert_eq!(failed.attempts, 5);
    assert!(repo.get_retryable_jobs(10).await.unwrap().is_empty());
    assert_eq!(queue.enqueued_count(), 0);
}

#[tokio::test]
async fn cancelled_job_message_is_dropped() {
    let repo = MockJobRepository::new();
    let queue = MockJobQueue::new();
    let registry = registry_with(vec![Arc::new(EchoHandler)]).await;

    let job = repo.create(&NewJob::new("echo", JobType::Immediate)).await.unwrap();
    repo.cancel_job(job.id).await.unwrap();
    process_message(&repo, &registry, &queue, &JobMessage::new(job.id, "echo")).await;

    let unchanged = repo.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, JobStatus::Cancelled);
    assert_eq!(unchanged.attempts, 0);
}

#[tokio::test]
async fn message_for_missing_job_is_dropped() {
    let repo = MockJobRepository::new();
    let queue = MockJobQueue::new();
    let registry = registry_with(vec![Arc::new(LoggingJobHandler::new("x"))]).await;

    // 不应panic，也不应产生任何作业
    process_message(&repo, &registry, &queue, &JobMessage::new(999, "x")).await;
    assert_eq!(repo.count(), 0);
}
