//! Redis 租约锁实现
//!
//! SET key sentinel NX EX ttl 的经典方案：NX 保证互斥，EX 保证持有者
//! 崩溃后锁自动过期，无需显式释放路径。sentinel 为实例级 uuid，便于
//! 排查持有者。

use async_trait::async_trait;
use jobflow_domain::locking::DistributedLock;
use jobflow_errors::{JobFlowError, JobFlowResult};
use redis::Client;
use tracing::debug;

pub struct RedisLeaseLock {
    client: Client,
    /// 本实例写入锁值的哨兵串
    owner: String,
}

impl RedisLeaseLock {
    pub fn new(redis_url: &str) -> JobFlowResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| JobFlowError::lock_error(format!("Failed to create Redis client: {e}")))?;
        Ok(Self {
            client,
            owner: uuid::Uuid::new_v4().to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }
}

#[async_trait]
impl DistributedLock for RedisLeaseLock {
    async fn try_acquire(&self, key: &str, ttl_seconds: u64) -> JobFlowResult<bool> {
        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| JobFlowError::lock_error(format!("Failed to connect to Redis: {e}")))?;

        // NX: 键已存在则返回 Nil，表示锁被他人持有
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(&self.owner)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query(&mut conn)
            .map_err(|e| JobFlowError::lock_error(format!("SET NX EX failed: {e}")))?;

        let acquired = reply.is_some();
        debug!(
            "lock attempt: key={} ttl={}s acquired={}",
            key, ttl_seconds, acquired
        );
        Ok(acquired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_sentinel_is_unique_per_instance() {
        let a = RedisLeaseLock::new("redis://127.0.0.1/").unwrap();
        let b = RedisLeaseLock::new("redis://127.0.0.1/").unwrap();
        assert_ne!(a.owner(), b.owner());
    }
}
