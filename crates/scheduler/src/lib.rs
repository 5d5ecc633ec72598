//! JobFlow 调度器
//!
//! cron驱动的作业实例化：触发器注册、点火循环与失败作业的重试扫描。

pub mod cron_utils;
pub mod retry_service;
pub mod scheduler;

pub use cron_utils::CronPlanner;
pub use retry_service::RetryScanService;
pub use scheduler::{JobScheduler, SchedulerConfig, SchedulerState};
