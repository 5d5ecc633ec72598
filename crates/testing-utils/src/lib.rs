//! Shared testing utilities for the jobflow workspace
//!
//! In-memory mocks for the domain ports plus builders for test data.

pub mod builders;
pub mod mocks;

pub use builders::{JobBuilder, ScheduleBuilder};
pub use mocks::{MockJobQueue, MockJobRepository, MockLock, MockScheduleRepository};
