//! 分布式租约锁抽象
//!
//! 用于多实例部署下的触发去重：同一调度点火只允许一个持有者执行。
//! 锁不可用按 “未获得”（Ok(false)）处理而不是错误，调用方据此决定
//! 跳过还是继续。

use async_trait::async_trait;
use jobflow_errors::JobFlowResult;
use std::time::Duration;
use tracing::warn;

/// 带重试获取的参数
#[derive(Debug, Clone)]
pub struct LockRetryOptions {
    pub key: String,
    pub ttl_seconds: u64,
    /// 额外重试次数；总尝试次数为 max_retries + 1
    pub max_retries: u32,
    /// 固定重试间隔（毫秒）
    pub retry_delay_ms: u64,
}

/// 分布式锁端口
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// 尝试获取租约；已被持有返回 Ok(false)，锁到期自动释放
    async fn try_acquire(&self, key: &str, ttl_seconds: u64) -> JobFlowResult<bool>;

    /// 固定间隔重试获取，穷尽后返回 Ok(false)
    async fn acquire_with_retry(&self, options: &LockRetryOptions) -> JobFlowResult<bool> {
        let attempts = options.max_retries + 1;
        for attempt in 1..=attempts {
            if self.try_acquire(&options.key, options.ttl_seconds).await? {
                return Ok(true);
            }
            if attempt < attempts {
                warn!(
                    "锁获取失败，准备重试: key={} attempt={}/{}",
                    options.key, attempt, attempts
                );
                tokio::time::sleep(Duration::from_millis(options.retry_delay_ms)).await;
            }
        }
        warn!(
            "锁获取重试穷尽: key={} attempts={}",
            options.key, attempts
        );
        Ok(false)
    }
}
