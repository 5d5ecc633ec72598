//! Test data builders for job and schedule entities
//!
//! Builder patterns with sensible defaults and easy customization.

use chrono::{DateTime, Utc};
use jobflow_domain::entities::{Job, JobPriority, JobStatus, JobType, Schedule};

/// Builder for creating test Job entities
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn new() -> Self {
        Self {
            job: Job {
                id: 1,
                name: "test_job".to_string(),
                job_type: JobType::Immediate,
                priority: JobPriority::Normal,
                status: JobStatus::Pending,
                payload: serde_json::json!({}),
                result: None,
                error: None,
                attempts: 0,
                max_retries: 3,
                scheduled_for: None,
                organization_id: None,
                started_at: None,
                completed_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.job.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.job.name = name.to_string();
        self
    }

    pub fn with_type(mut self, job_type: JobType) -> Self {
        self.job.job_type = job_type;
        self
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.job.priority = priority;
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.job.status = status;
        self
    }

    pub fn with_attempts(mut self, attempts: i32, max_retries: i32) -> Self {
        self.job.attempts = attempts;
        self.job.max_retries = max_retries;
        self
    }

    pub fn with_scheduled_for(mut self, scheduled_for: DateTime<Utc>) -> Self {
        self.job.scheduled_for = Some(scheduled_for);
        self
    }

    pub fn with_organization_id(mut self, organization_id: i64) -> Self {
        self.job.organization_id = Some(organization_id);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.job.created_at = created_at;
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}

impl Default for JobBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test Schedule entities
pub struct ScheduleBuilder {
    schedule: Schedule,
}

impl ScheduleBuilder {
    pub fn new() -> Self {
        Self {
            schedule: Schedule {
                id: 1,
                name: "test_schedule".to_string(),
                job_name: "test_job".to_string(),
                cron_expression: Some("0 0 2 * * *".to_string()),
                timezone: "UTC".to_string(),
                is_active: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.schedule.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.schedule.name = name.to_string();
        self
    }

    pub fn with_job_name(mut self, job_name: &str) -> Self {
        self.schedule.job_name = job_name.to_string();
        self
    }

    pub fn with_cron(mut self, cron: &str) -> Self {
        self.schedule.cron_expression = Some(cron.to_string());
        self
    }

    pub fn without_cron(mut self) -> Self {
        self.schedule.cron_expression = None;
        self
    }

    pub fn with_timezone(mut self, timezone: &str) -> Self {
        self.schedule.timezone = timezone.to_string();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.schedule.is_active = false;
        self
    }

    pub fn build(self) -> Schedule {
        self.schedule
    }
}

impl Default for ScheduleBuilder {
    fn default() -> Self {
        Self::new()
    }
}
