//! JobFlow 领域模型
//!
//! 纯领域层：实体、状态机、统计模型与端口（仓储/队列/锁）抽象，
//! 不包含任何具体后端实现。

pub mod entities;
pub mod locking;
pub mod messaging;
pub mod repositories;
pub mod stats;
pub mod status_update;

pub use entities::{dispatch_order, Job, JobPriority, JobStatus, JobType, NewJob, Schedule};
pub use locking::{DistributedLock, LockRetryOptions};
pub use messaging::{EnqueueOptions, JobMessage, JobQueue};
pub use repositories::{JobRepository, ScheduleRepository};
pub use stats::{JobStats, PriorityCounts, StatusCounts, TimeRange, TypeCounts};
pub use status_update::JobStatusUpdate;
