use std::sync::Arc;
use std::time::Duration;

use jobflow_domain::{
    entities::JobStatus,
    messaging::{JobMessage, JobQueue},
    repositories::JobRepository,
};
use jobflow_errors::JobFlowResult;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use crate::registry::JobHandlerRegistry;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// 轮询的队列名列表（队列名即作业种类）
    pub queues: Vec<String>,
    /// 并发执行上限
    pub max_concurrent: usize,
    /// 队列为空时的轮询间隔（毫秒）
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queues: vec![],
            max_concurrent: 4,
            poll_interval_ms: 500,
        }
    }
}

/// 作业执行服务
///
/// 从执行队列拉取消息，按作业名找到处理器执行，并把结果写回作业存储。
/// 消息只携带作业引用，执行前以存储中的最新状态为准。
pub struct WorkerService {
    job_repo: Arc<dyn JobRepository>,
    queue: Arc<dyn JobQueue>,
    registry: Arc<JobHandlerRegistry>,
    config: WorkerConfig,
    shutdown_tx: watch::Sender<bool>,
}

impl WorkerService {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        queue: Arc<dyn JobQueue>,
        registry: Arc<JobHandlerRegistry>,
        config: WorkerConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            job_repo,
            queue,
            registry,
            config,
            shutdown_tx,
        }
    }

    /// 请求停止；run() 在处理完在途作业后返回
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// 轮询循环，直到收到停止信号
    pub async fn run(&self) -> JobFlowResult<()> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!(
            "Worker启动: queues={:?} max_concurrent={}",
            self.config.queues, self.config.max_concurrent
        );

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let mut drained = true;
            for queue_name in &self.config.queues {
                match self.queue.dequeue(queue_name).await {
                    Ok(Some(message)) => {
                        drained = false;
                        let permit = semaphore.clone().acquire_owned().await.map_err(|e| {
                            jobflow_errors::JobFlowError::Internal(e.to_string())
                        })?;
                        let job_repo = self.job_repo.clone();
                        let registry = self.registry.clone();
                        let queue = self.queue.clone();
                        tokio::spawn(async move {
                            process_message(&*job_repo, &registry, &*queue, &message).await;
                            drop(permit);
                        });
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!("出队失败: queue={} error={}", queue_name, e);
                    }
                }
            }

            if drained {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)) => {}
                    _ = shutdown_rx.changed() => {}
                }
            }
        }

        // 等待在途作业收尾
        let _ = semaphore.acquire_many(self.config.max_concurrent as u32).await;
        info!("Worker已停止");
        Ok(())
    }
}

/// 处理单条消息，内部消化所有错误
///
/// 作业缺失或已取消时静默丢弃消息；处理器缺失按永久失败处理；执行
/// 失败且仍有重试预算时转入 retrying 并把消息重新投递回队列，由下一
/// 次消费驱动 retrying -> running；预算耗尽则永久失败。
pub async fn process_message(
    job_repo: &dyn JobRepository,
    registry: &JobHandlerRegistry,
    queue: &dyn JobQueue,
    message: &JobMessage,
) {
    let job = match job_repo.get_by_id(message.job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            warn!("消息指向的作业不存在，丢弃: job_id={}", message.job_id);
            return;
        }
        Err(e) => {
            error!("读取作业失败: job_id={} error={}", message.job_id, e);
            return;
        }
    };

    if job.status == JobStatus::Cancelled {
        debug!("作业已取消，丢弃消息: job_id={}", job.id);
        return;
    }

    let started = match job_repo.start_job(job.id).await {
        Ok(started) => started,
        Err(e) => {
            error!("作业启动失败: job_id={} error={}", job.id, e);
            return;
        }
    };

    let handler = match registry.get(&started.name).await {
        Some(handler) => handler,
        None => {
            warn!("没有注册处理器，作业永久失败: name={}", started.name);
            let reason = format!("没有注册处理器: {}", started.name);
            if let Err(e) = job_repo.fail_job(started.id, &reason, false).await {
                error!("标记作业失败时出错: job_id={} error={}", started.id, e);
            }
            return;
        }
    };

    match handler.execute(&started).await {
        Ok(result) => {
            debug!("作业执行成功: job_id={}", started.id);
            if let Err(e) = job_repo.complete_job(started.id, Some(result)).await {
                error!("标记作业完成时出错: job_id={} error={}", started.id, e);
            }
        }
        Err(e) => {
            let should_retry = started.has_retries_left();
            warn!(
                "作业执行失败: job_id={} attempts={}/{} retry={} error={}",
                started.id, started.attempts, started.max_retries, should_retry, e
            );
            if let Err(e) = job_repo
                .fail_job(started.id, &e.to_string(), should_retry)
                .await
            {
                error!("标记作业失败时出错: job_id={} error={}", started.id, e);
                return;
            }
            // retrying 状态的作业没人会再投递，必须由这里把消息还回队列
            if should_retry {
                let retry_message = JobMessage::new(started.id, &started.name);
                if let Err(e) = queue.enqueue(&started.name, &retry_message, None).await {
                    error!("重试消息投递失败: job_id={} error={}", started.id, e);
                }
            }
        }
    }
}
