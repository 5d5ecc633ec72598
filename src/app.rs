use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::broadcast;
use tracing::{error, info};

use jobflow_domain::{
    locking::DistributedLock,
    messaging::JobQueue,
    repositories::{JobRepository, ScheduleRepository},
};
use jobflow_infrastructure::database::{postgres, sqlite};
use jobflow_infrastructure::{
    InMemoryJobQueue, PostgresJobRepository, PostgresScheduleRepository, RedisLeaseLock,
    SqliteJobRepository, SqliteScheduleRepository,
};
use jobflow_scheduler::{JobScheduler, RetryScanService, SchedulerConfig};
use jobflow_worker::{JobHandler, JobHandlerRegistry, LoggingJobHandler, WorkerConfig, WorkerService};

use crate::config::AppConfig;

/// 应用实例：按配置装配存储、队列、调度器与Worker
pub struct Application {
    config: AppConfig,
    scheduler: Arc<JobScheduler>,
    worker: Arc<WorkerService>,
    retry_service: Arc<RetryScanService>,
    registry: Arc<JobHandlerRegistry>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let (job_repo, schedule_repo) = Self::build_repositories(&config).await?;
        let queue: Arc<dyn JobQueue> =
            Arc::new(InMemoryJobQueue::with_capacity(config.queue.max_queue_size));

        let lock: Option<Arc<dyn DistributedLock>> = match &config.lock {
            Some(lock_config) => {
                let lock = RedisLeaseLock::new(&lock_config.redis_url)
                    .context("创建Redis租约锁失败")?;
                info!("分布式锁已启用: owner={}", lock.owner());
                Some(Arc::new(lock))
            }
            None => {
                info!("未配置分布式锁，按单实例模式运行");
                None
            }
        };

        let scheduler = Arc::new(JobScheduler::new(
            schedule_repo,
            job_repo.clone(),
            queue.clone(),
            lock,
            SchedulerConfig {
                default_max_retries: config.scheduler.default_max_retries,
                fire_lock_ttl_seconds: config.scheduler.fire_lock_ttl_seconds,
            },
        ));

        let retry_service = Arc::new(RetryScanService::new(
            job_repo.clone(),
            queue.clone(),
            config.scheduler.retry_batch_size,
        ));

        let registry = Arc::new(JobHandlerRegistry::new());
        // 配置的每个队列先挂一个日志处理器，真实处理器由调用方覆盖注册
        for queue_name in &config.worker.queues {
            registry
                .register(Arc::new(LoggingJobHandler::new(queue_name)))
                .await;
        }

        let worker = Arc::new(WorkerService::new(
            job_repo,
            queue,
            registry.clone(),
            WorkerConfig {
                queues: config.worker.queues.clone(),
                max_concurrent: config.worker.max_concurrent,
                poll_interval_ms: config.worker.poll_interval_ms,
            },
        ));

        Ok(Self {
            config,
            scheduler,
            worker,
            retry_service,
            registry,
        })
    }

    async fn build_repositories(
        config: &AppConfig,
    ) -> Result<(Arc<dyn JobRepository>, Arc<dyn ScheduleRepository>)> {
        if config.database.url.starts_with("postgres") {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .connect(&config.database.url)
                .await
                .context("连接PostgreSQL失败")?;
            postgres::create_tables(&pool).await?;
            info!("使用PostgreSQL存储");
            Ok((
                Arc::new(PostgresJobRepository::new(pool.clone())),
                Arc::new(PostgresScheduleRepository::new(pool)),
            ))
        } else {
            // 内存库多连接会各自为政，必须收敛到单连接
            let max_connections = if config.database.url.contains(":memory:") {
                1
            } else {
                config.database.max_connections
            };
            let pool = SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect(&config.database.url)
                .await
                .context("打开SQLite数据库失败")?;
            sqlite::create_tables(&pool).await?;
            info!("使用SQLite存储: {}", config.database.url);
            Ok((
                Arc::new(SqliteJobRepository::new(pool.clone())),
                Arc::new(SqliteScheduleRepository::new(pool)),
            ))
        }
    }

    /// 注册真实的作业处理器
    pub async fn register_handler(&self, handler: Arc<dyn JobHandler>) {
        self.registry.register(handler).await;
    }

    pub fn scheduler(&self) -> Arc<JobScheduler> {
        self.scheduler.clone()
    }

    /// 运行直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if self.config.scheduler.enabled {
            self.scheduler.start().await?;
        }

        let retry_handle = if self.config.scheduler.enabled {
            let retry_service = self.retry_service.clone();
            let interval = Duration::from_secs(self.config.scheduler.retry_scan_interval_seconds);
            let mut retry_shutdown = shutdown_rx.resubscribe();
            Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await; // 首次tick立即返回，跳过
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            if let Err(e) = retry_service.scan_once().await {
                                error!("重试扫描出错: {e}");
                            }
                        }
                        _ = retry_shutdown.recv() => break,
                    }
                }
            }))
        } else {
            None
        };

        let worker_handle = if self.config.worker.enabled {
            let worker = self.worker.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = worker.run().await {
                    error!("Worker运行失败: {e}");
                }
            }))
        } else {
            None
        };

        let _ = shutdown_rx.recv().await;
        info!("开始优雅关闭");

        self.scheduler.stop().await;
        self.worker.shutdown();

        if let Some(handle) = retry_handle {
            let _ = handle.await;
        }
        if let Some(handle) = worker_handle {
            let _ = handle.await;
        }
        Ok(())
    }
}
