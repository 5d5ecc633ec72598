//! JobFlow 执行层
//!
//! 从执行队列消费作业引用并驱动状态机：处理器注册表与轮询式
//! Worker 服务。

pub mod registry;
pub mod service;

pub use registry::{JobHandler, JobHandlerRegistry, LoggingJobHandler};
pub use service::{process_message, WorkerConfig, WorkerService};
