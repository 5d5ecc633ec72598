//! 内存执行队列实现
//!
//! 使用 Tokio channels 实现的进程内队列，适用于嵌入式部署场景。
//! 延迟消息通过后台任务在到期后再投递，入队即返回消息ID。

use async_trait::async_trait;
use jobflow_domain::messaging::{EnqueueOptions, JobMessage, JobQueue};
use jobflow_errors::{JobFlowError, JobFlowResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, warn};

#[derive(Debug)]
struct QueueChannel {
    sender: mpsc::UnboundedSender<JobMessage>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<JobMessage>>>,
    /// 可见消息数，延迟中的消息不计入
    size: Arc<AtomicU32>,
    /// 延迟投递中的消息数；容量检查计入，queue_size 不计入
    delayed: Arc<AtomicU32>,
}

impl QueueChannel {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            size: Arc::new(AtomicU32::new(0)),
            delayed: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[derive(Debug)]
pub struct InMemoryJobQueue {
    queues: Arc<RwLock<HashMap<String, QueueChannel>>>,
    /// 单队列容量上限，0 表示无限制
    max_queue_size: u32,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::with_capacity(10000)
    }

    pub fn with_capacity(max_queue_size: u32) -> Self {
        Self {
            queues: Arc::new(RwLock::new(HashMap::new())),
            max_queue_size,
        }
    }

    async fn channel_parts(
        &self,
        queue: &str,
    ) -> (mpsc::UnboundedSender<JobMessage>, Arc<AtomicU32>, Arc<AtomicU32>) {
        {
            let queues = self.queues.read().await;
            if let Some(channel) = queues.get(queue) {
                return (
                    channel.sender.clone(),
                    channel.size.clone(),
                    channel.delayed.clone(),
                );
            }
        }
        let mut queues = self.queues.write().await;
        let channel = queues
            .entry(queue.to_string())
            .or_insert_with(QueueChannel::new);
        (
            channel.sender.clone(),
            channel.size.clone(),
            channel.delayed.clone(),
        )
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(
        &self,
        queue: &str,
        message: &JobMessage,
        options: Option<EnqueueOptions>,
    ) -> JobFlowResult<String> {
        let (sender, size, delayed) = self.channel_parts(queue).await;

        // 延迟中的消息一并计入容量，投递时刻才超限就晚了
        let occupied = size.load(Ordering::Relaxed) + delayed.load(Ordering::Relaxed);
        if self.max_queue_size > 0 && occupied >= self.max_queue_size {
            return Err(JobFlowError::queue_error(format!(
                "队列已满: {queue} (capacity {})",
                self.max_queue_size
            )));
        }

        let message = message.clone();
        let message_id = message.id.clone();
        let delay_ms = options.map(|o| o.delay_ms).unwrap_or(0);

        if delay_ms > 0 {
            let queue_name = queue.to_string();
            delayed.fetch_add(1, Ordering::Relaxed);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delayed.fetch_sub(1, Ordering::Relaxed);
                if sender.send(message).is_ok() {
                    size.fetch_add(1, Ordering::Relaxed);
                } else {
                    warn!("延迟消息投递失败，队列已关闭: {}", queue_name);
                }
            });
        } else {
            sender
                .send(message)
                .map_err(|e| JobFlowError::queue_error(format!("消息投递失败: {e}")))?;
            size.fetch_add(1, Ordering::Relaxed);
        }

        debug!(
            "消息已入队: queue={} message_id={} delay_ms={}",
            queue, message_id, delay_ms
        );
        Ok(message_id)
    }

    async fn dequeue(&self, queue: &str) -> JobFlowResult<Option<JobMessage>> {
        let receiver = {
            let queues = self.queues.read().await;
            match queues.get(queue) {
                Some(channel) => (channel.receiver.clone(), channel.size.clone()),
                None => return Ok(None),
            }
        };
        let (receiver, size) = receiver;

        let mut receiver = receiver.lock().await;
        match receiver.try_recv() {
            Ok(message) => {
                size.fetch_sub(1, Ordering::Relaxed);
                Ok(Some(message))
            }
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Ok(None),
        }
    }

    async fn queue_size(&self, queue: &str) -> JobFlowResult<u32> {
        let queues = self.queues.read().await;
        Ok(queues
            .get(queue)
            .map(|channel| channel.size.load(Ordering::Relaxed))
            .unwrap_or(0))
    }

    async fn purge(&self, queue: &str) -> JobFlowResult<()> {
        let parts = {
            let queues = self.queues.read().await;
            queues
                .get(queue)
                .map(|channel| (channel.receiver.clone(), channel.size.clone()))
        };

        if let Some((receiver, size)) = parts {
            let mut receiver = receiver.lock().await;
            while receiver.try_recv().is_ok() {}
            size.store(0, Ordering::Relaxed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_dequeue_preserves_message() {
        let queue = InMemoryJobQueue::new();
        let message = JobMessage::new(42, "send_email");

        let id = queue.enqueue("send_email", &message, None).await.unwrap();
        assert_eq!(id, message.id);
        assert_eq!(queue.queue_size("send_email").await.unwrap(), 1);

        let received = queue.dequeue("send_email").await.unwrap().unwrap();
        assert_eq!(received.job_id, 42);
        assert_eq!(queue.queue_size("send_email").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dequeue_on_missing_queue_returns_none() {
        let queue = InMemoryJobQueue::new();
        assert!(queue.dequeue("nonexistent").await.unwrap().is_none());
        assert_eq!(queue.queue_size("nonexistent").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delayed_message_not_visible_before_deadline() {
        let queue = InMemoryJobQueue::new();
        let message = JobMessage::new(1, "report");
        let options = EnqueueOptions {
            delay_ms: 200,
            ..Default::default()
        };

        queue.enqueue("report", &message, Some(options)).await.unwrap();
        assert!(queue.dequeue("report").await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(queue.dequeue("report").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn full_queue_rejects_enqueue() {
        let queue = InMemoryJobQueue::with_capacity(1);
        queue
            .enqueue("q", &JobMessage::new(1, "a"), None)
            .await
            .unwrap();
        let err = queue.enqueue("q", &JobMessage::new(2, "b"), None).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn delayed_messages_count_toward_capacity() {
        let queue = InMemoryJobQueue::with_capacity(1);
        let options = EnqueueOptions {
            delay_ms: 200,
            ..Default::default()
        };
        queue
            .enqueue("q", &JobMessage::new(1, "a"), Some(options))
            .await
            .unwrap();

        // 延迟消息尚不可见，但容量已被占用
        assert_eq!(queue.queue_size("q").await.unwrap(), 0);
        assert!(queue.enqueue("q", &JobMessage::new(2, "b"), None).await.is_err());

        // 投递后占用转为可见消息，消费掉即可再入队
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(queue.dequeue("q").await.unwrap().is_some());
        assert!(queue.enqueue("q", &JobMessage::new(3, "c"), None).await.is_ok());
    }

    #[tokio::test]
    async fn purge_empties_queue() {
        let queue = InMemoryJobQueue::new();
        for i in 0..3 {
            queue
                .enqueue("q", &JobMessage::new(i, "a"), None)
                .await
                .unwrap();
        }
        queue.purge("q").await.unwrap();
        assert_eq!(queue.queue_size("q").await.unwrap(), 0);
        assert!(queue.dequeue("q").await.unwrap().is_none());
    }
}
