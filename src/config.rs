use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// 应用配置
///
/// 配置文件（TOML）与 `JOBFLOW__` 前缀的环境变量叠加，环境变量优先。
/// 所有字段都有默认值，零配置即可嵌入式启动。
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub worker: WorkerSettings,
    /// 未配置时不启用分布式锁（单实例部署）
    #[serde(default)]
    pub lock: Option<LockConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    pub max_queue_size: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub default_max_retries: i32,
    pub fire_lock_ttl_seconds: u64,
    pub retry_scan_interval_seconds: u64,
    pub retry_batch_size: i64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_max_retries: 3,
            fire_lock_ttl_seconds: 60,
            retry_scan_interval_seconds: 30,
            retry_batch_size: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    pub enabled: bool,
    pub queues: Vec<String>,
    pub max_concurrent: usize,
    pub poll_interval_ms: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            queues: vec![],
            max_concurrent: 4,
            poll_interval_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    pub redis_url: String,
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        builder
            .add_source(Environment::with_prefix("JOBFLOW").separator("__"))
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("解析配置失败")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_allow_zero_config_startup() {
        let config = AppConfig::default();
        assert!(config.scheduler.enabled);
        assert!(config.worker.enabled);
        assert!(config.lock.is_none());
        assert_eq!(config.database.url, "sqlite::memory:");
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.scheduler.retry_batch_size, 100);
    }
}
