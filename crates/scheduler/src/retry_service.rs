use std::sync::Arc;

use tracing::{debug, error, info};

use jobflow_domain::{
    messaging::{JobMessage, JobQueue},
    repositories::JobRepository,
};
use jobflow_errors::JobFlowResult;

/// 重试扫描服务
///
/// 周期性地把仍有重试余量的失败作业重新投递到执行队列。单个作业的
/// 投递失败只记日志，不影响同批其他作业。
pub struct RetryScanService {
    job_repo: Arc<dyn JobRepository>,
    queue: Arc<dyn JobQueue>,
    batch_size: i64,
}

impl RetryScanService {
    pub fn new(job_repo: Arc<dyn JobRepository>, queue: Arc<dyn JobQueue>, batch_size: i64) -> Self {
        Self {
            job_repo,
            queue,
            batch_size,
        }
    }

    /// 扫描一轮，返回成功重新投递的作业数
    pub async fn scan_once(&self) -> JobFlowResult<usize> {
        let jobs = self.job_repo.get_retryable_jobs(self.batch_size).await?;
        if jobs.is_empty() {
            debug!("无可重试作业");
            return Ok(0);
        }

        let mut requeued = 0;
        for job in jobs {
            let message = JobMessage::new(job.id, &job.name);
            match self.queue.enqueue(&job.name, &message, None).await {
                Ok(message_id) => {
                    debug!(
                        "失败作业已重新投递: job_id={} attempts={}/{} message_id={}",
                        job.id, job.attempts, job.max_retries, message_id
                    );
                    requeued += 1;
                }
                Err(e) => {
                    error!("重试投递失败: job_id={} error={}", job.id, e);
                }
            }
        }

        info!("重试扫描完成，重新投递 {} 个作业", requeued);
        Ok(requeued)
    }
}
