use async_trait::async_trait;
use jobflow_domain::entities::Job;
use jobflow_errors::JobFlowResult;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// 作业处理器
///
/// 每种作业一个实现，`name()` 与作业种类一致。执行失败以 Err 返回，
/// 由 WorkerService 决定重试还是永久失败。
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn name(&self) -> &str;
    async fn execute(&self, job: &Job) -> JobFlowResult<Value>;
}

/// 处理器注册表
#[derive(Default)]
pub struct JobHandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn JobHandler>>>,
}

impl JobHandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// 注册处理器，同名覆盖
    pub async fn register(&self, handler: Arc<dyn JobHandler>) {
        let name = handler.name().to_string();
        self.handlers.write().await.insert(name.clone(), handler);
        info!("处理器已注册: {}", name);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.read().await.get(name).cloned()
    }

    pub async fn registered_names(&self) -> Vec<String> {
        self.handlers.read().await.keys().cloned().collect()
    }
}

/// 只记日志的处理器，用于冒烟验证和演示部署
pub struct LoggingJobHandler {
    name: String,
}

impl LoggingJobHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl JobHandler for LoggingJobHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, job: &Job) -> JobFlowResult<Value> {
        debug!("执行作业: {} payload={}", job.entity_description(), job.payload);
        Ok(serde_json::json!({ "logged": true }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_and_lookup() {
        let registry = JobHandlerRegistry::new();
        registry
            .register(Arc::new(LoggingJobHandler::new("send_email")))
            .await;

        assert!(registry.get("send_email").await.is_some());
        assert!(registry.get("unknown").await.is_none());
        assert_eq!(registry.registered_names().await, vec!["send_email"]);
    }
}
