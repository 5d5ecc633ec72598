//! JobFlow 基础设施层
//!
//! 领域端口的具体后端：SQLite/PostgreSQL 仓储、内存执行队列与
//! Redis 租约锁。

pub mod database;
pub mod in_memory_queue;
pub mod redis_lock;

pub use database::postgres::{PostgresJobRepository, PostgresScheduleRepository};
pub use database::sqlite::{SqliteJobRepository, SqliteScheduleRepository};
pub use in_memory_queue::InMemoryJobQueue;
pub use redis_lock::RedisLeaseLock;
