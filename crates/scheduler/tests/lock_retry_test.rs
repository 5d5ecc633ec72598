use std::time::Instant;

use jobflow_domain::locking::{DistributedLock, LockRetryOptions};
use jobflow_errors::JobFlowError;
use jobflow_testing_utils::MockLock;

fn options(max_retries: u32, retry_delay_ms: u64) -> LockRetryOptions {
    LockRetryOptions {
        key: "jobflow:fire:1:1770000000".to_string(),
        ttl_seconds: 30,
        max_retries,
        retry_delay_ms,
    }
}

#[tokio::test]
async fn acquires_on_first_attempt_without_delay() {
    let lock = MockLock::always_available();
    let acquired = lock.acquire_with_retry(&options(3, 500)).await.unwrap();
    assert!(acquired);
    assert_eq!(lock.attempt_count(), 1);
}

#[tokio::test]
async fn retries_until_lock_frees_up() {
    let lock = MockLock::with_script(vec![Ok(false), Ok(false), Ok(true)]);
    let acquired = lock.acquire_with_retry(&options(3, 10)).await.unwrap();
    assert!(acquired);
    assert_eq!(lock.attempt_count(), 3);
}

#[tokio::test]
async fn exhausted_retries_return_false_not_error() {
    let lock = MockLock::always_held();
    let acquired = lock.acquire_with_retry(&options(2, 10)).await.unwrap();
    assert!(!acquired);
    // 总尝试次数 = 重试数 + 1
    assert_eq!(lock.attempt_count(), 3);
}

#[tokio::test]
async fn zero_retries_means_single_attempt() {
    let lock = MockLock::always_held();
    let start = Instant::now();
    let acquired = lock.acquire_with_retry(&options(0, 5000)).await.unwrap();
    assert!(!acquired);
    assert_eq!(lock.attempt_count(), 1);
    // 没有重试就不应有任何延迟等待
    assert!(start.elapsed().as_millis() < 1000);
}

#[tokio::test]
async fn backend_error_propagates() {
    let lock = MockLock::with_script(vec![Err(JobFlowError::lock_error("connection refused"))]);
    let result = lock.acquire_with_retry(&options(3, 10)).await;
    assert!(result.is_err());
    assert_eq!(lock.attempt_count(), 1);
}
