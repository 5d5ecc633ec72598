use tokio::sync::broadcast;
use tracing::{debug, info};

/// 优雅关闭管理器
///
/// 广播一次性的关闭信号；重复触发为幂等。
pub struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self { shutdown_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown(&self) {
        let subscribers = self.shutdown_tx.receiver_count();
        debug!("发送关闭信号给 {} 个订阅者", subscribers);
        // 没有接收者时发送失败是正常的
        let _ = self.shutdown_tx.send(());
        info!("关闭信号已发送");
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_shutdown() {
        let manager = ShutdownManager::new();
        let mut rx = manager.subscribe();
        manager.shutdown();
        assert!(rx.recv().await.is_ok());
    }

    #[test]
    fn shutdown_without_subscribers_does_not_panic() {
        let manager = ShutdownManager::new();
        manager.shutdown();
        manager.shutdown();
    }
}
