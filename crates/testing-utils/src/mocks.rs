//! Mock implementations for the repository, queue and lock traits
//!
//! In-memory stand-ins for unit testing without a database, a broker or
//! a Redis instance. The job mock mirrors the real stores' transition
//! semantics (attempts increment, completed_at stamping) so state
//! machine tests behave identically against it.

use async_trait::async_trait;
use chrono::Utc;
use jobflow_domain::entities::{dispatch_order, Job, JobStatus, NewJob, Schedule};
use jobflow_domain::locking::DistributedLock;
use jobflow_domain::messaging::{EnqueueOptions, JobMessage, JobQueue};
use jobflow_domain::repositories::{JobRepository, ScheduleRepository};
use jobflow_domain::stats::{JobStats, TimeRange};
use jobflow_domain::status_update::JobStatusUpdate;
use jobflow_errors::{JobFlowError, JobFlowResult};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Mock implementation of JobRepository for testing
#[derive(Debug, Clone)]
pub struct MockJobRepository {
    jobs: Arc<Mutex<HashMap<i64, Job>>>,
    next_id: Arc<Mutex<i64>>,
}

impl MockJobRepository {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    pub fn with_jobs(jobs: Vec<Job>) -> Self {
        let mut map = HashMap::new();
        let mut max_id = 0;
        for job in jobs {
            if job.id > max_id {
                max_id = job.id;
            }
            map.insert(job.id, job);
        }
        Self {
            jobs: Arc::new(Mutex::new(map)),
            next_id: Arc::new(Mutex::new(max_id + 1)),
        }
    }

    pub fn count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn all_jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().values().cloned().collect()
    }
}

impl Default for MockJobRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobRepository for MockJobRepository {
    async fn create(&self, job: &NewJob) -> JobFlowResult<Job> {
        job.validate()?;
        let mut jobs = self.jobs.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();

        let now = Utc::now();
        let created = Job {
            id: *next_id,
            name: job.name.clone(),
            job_type: job.job_type,
            priority: job.priority,
            status: JobStatus::Pending,
            payload: job.payload.clone(),
            result: None,
            error: None,
            attempts: 0,
            max_retries: job.max_retries,
            scheduled_for: job.scheduled_for,
            organization_id: job.organization_id,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        *next_id += 1;
        jobs.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> JobFlowResult<Option<Job>> {
        Ok(self.jobs.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_status(&self, status: JobStatus, limit: i64) -> JobFlowResult<Vec<Job>> {
        let jobs = self.jobs.lock().unwrap();
        let mut matched: Vec<Job> = jobs
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect();
        matched.sort_by_key(|j| j.created_at);
        matched.truncate(limit as usize);
        Ok(matched)
    }

    async fn get_pending_jobs(
        &self,
        limit: i64,
        organization_id: Option<i64>,
    ) -> JobFlowResult<Vec<Job>> {
        let now = Utc::now();
        let jobs = self.jobs.lock().unwrap();
        let mut matched: Vec<Job> = jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .filter(|j| j.scheduled_for.map(|t| t <= now).unwrap_or(true))
            .filter(|j| organization_id.is_none() || j.organization_id == organization_id)
            .cloned()
            .collect();
        matched.sort_by(dispatch_order);
        matched.truncate(limit as usize);
        Ok(matched)
    }

    async fn get_retryable_jobs(&self, limit: i64) -> JobFlowResult<Vec<Job>> {
        let jobs = self.jobs.lock().unwrap();
        let mut matched: Vec<Job> = jobs
            .values()
            .filter(|j| j.status == JobStatus::Failed && j.attempts < j.max_retries)
            .cloned()
            .collect();
        matched.sort_by(dispatch_order);
        matched.truncate(limit as usize);
        Ok(matched)
    }

    async fn update_status(
        &self,
        id: i64,
        status: JobStatus,
        update: JobStatusUpdate,
    ) -> JobFlowResult<Job> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&id)
            .ok_or(JobFlowError::JobNotFound { id })?;

        let now = Utc::now();
        job.status = status;
        if update.increment_attempts {
            job.attempts += 1;
        }
        if update.exhaust_attempts {
            job.attempts = job.attempts.max(job.max_retries);
        }
        job.completed_at = if status.is_terminal() {
            update.completed_at.or(Some(now))
        } else {
            update.completed_at
        };
        if let Some(started_at) = update.started_at {
            job.started_at = Some(started_at);
        }
        if let Some(result) = update.result {
            job.result = Some(result);
        }
        if let Some(error) = update.error {
            job.error = Some(error);
        }
        job.updated_at = now;
        Ok(job.clone())
    }

    async fn get_stats(
        &self,
        organization_id: Option<i64>,
        time_range: Option<TimeRange>,
    ) -> JobFlowResult<JobStats> {
        let jobs = self.jobs.lock().unwrap();
        let mut stats = JobStats::default();
        for job in jobs.values() {
            if organization_id.is_some() && job.organization_id != organization_id {
                continue;
            }
            if let Some(range) = &time_range {
                if range.from.map(|from| job.created_at < from).unwrap_or(false) {
                    continue;
                }
                if range.to.map(|to| job.created_at > to).unwrap_or(false) {
                    continue;
                }
            }
            stats.total += 1;
            match job.status {
                JobStatus::Pending => stats.by_status.pending += 1,
                JobStatus::Running => stats.by_status.running += 1,
                JobStatus::Completed => stats.by_status.completed += 1,
                JobStatus::Failed => stats.by_status.failed += 1,
                JobStatus::Cancelled => stats.by_status.cancelled += 1,
                JobStatus::Retrying => stats.by_status.retrying += 1,
            }
            match job.job_type {
                jobflow_domain::entities::JobType::Cron => stats.by_type.cron += 1,
                jobflow_domain::entities::JobType::Scheduled => stats.by_type.scheduled += 1,
                jobflow_domain::entities::JobType::Immediate => stats.by_type.immediate += 1,
                jobflow_domain::entities::JobType::Recurring => stats.by_type.recurring += 1,
            }
            match job.priority {
                jobflow_domain::entities::JobPriority::Low => stats.by_priority.low += 1,
                jobflow_domain::entities::JobPriority::Normal => stats.by_priority.normal += 1,
                jobflow_domain::entities::JobPriority::High => stats.by_priority.high += 1,
                jobflow_domain::entities::JobPriority::Critical => stats.by_priority.critical += 1,
            }
        }
        Ok(stats)
    }
}

/// Mock implementation of ScheduleRepository for testing
#[derive(Debug, Clone)]
pub struct MockScheduleRepository {
    schedules: Arc<Mutex<HashMap<i64, Schedule>>>,
    next_id: Arc<Mutex<i64>>,
}

impl MockScheduleRepository {
    pub fn new() -> Self {
        Self {
            schedules: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    pub fn with_schedules(schedules: Vec<Schedule>) -> Self {
        let mut map = HashMap::new();
        let mut max_id = 0;
        for schedule in schedules {
            if schedule.id > max_id {
                max_id = schedule.id;
            }
            map.insert(schedule.id, schedule);
        }
        Self {
            schedules: Arc::new(Mutex::new(map)),
            next_id: Arc::new(Mutex::new(max_id + 1)),
        }
    }
}

impl Default for MockScheduleRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScheduleRepository for MockScheduleRepository {
    async fn create(&self, schedule: &Schedule) -> JobFlowResult<Schedule> {
        let mut schedules = self.schedules.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();
        let mut created = schedule.clone();
        created.id = *next_id;
        *next_id += 1;
        schedules.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> JobFlowResult<Option<Schedule>> {
        Ok(self.schedules.lock().unwrap().get(&id).cloned())
    }

    async fn update(&self, schedule: &Schedule) -> JobFlowResult<()> {
        let mut schedules = self.schedules.lock().unwrap();
        if !schedules.contains_key(&schedule.id) {
            return Err(JobFlowError::ScheduleNotFound { id: schedule.id });
        }
        schedules.insert(schedule.id, schedule.clone());
        Ok(())
    }

    async fn delete(&self, id: i64) -> JobFlowResult<()> {
        let mut schedules = self.schedules.lock().unwrap();
        schedules
            .remove(&id)
            .map(|_| ())
            .ok_or(JobFlowError::ScheduleNotFound { id })
    }

    async fn list(&self) -> JobFlowResult<Vec<Schedule>> {
        let mut all: Vec<Schedule> = self.schedules.lock().unwrap().values().cloned().collect();
        all.sort_by_key(|s| s.id);
        Ok(all)
    }

    async fn list_schedulable(&self) -> JobFlowResult<Vec<Schedule>> {
        let mut all: Vec<Schedule> = self
            .schedules
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.is_schedulable())
            .cloned()
            .collect();
        all.sort_by_key(|s| s.id);
        Ok(all)
    }
}

/// Mock implementation of JobQueue recording every enqueue
#[derive(Debug, Clone, Default)]
pub struct MockJobQueue {
    queues: Arc<Mutex<HashMap<String, VecDeque<JobMessage>>>>,
    enqueued: Arc<Mutex<Vec<(String, JobMessage)>>>,
}

impl MockJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueued_count(&self) -> usize {
        self.enqueued.lock().unwrap().len()
    }

    /// All messages ever enqueued to a queue, in order
    pub fn enqueued_for(&self, queue: &str) -> Vec<JobMessage> {
        self.enqueued
            .lock()
            .unwrap()
            .iter()
            .filter(|(q, _)| q == queue)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

#[async_trait]
impl JobQueue for MockJobQueue {
    async fn enqueue(
        &self,
        queue: &str,
        message: &JobMessage,
        _options: Option<EnqueueOptions>,
    ) -> JobFlowResult<String> {
        self.queues
            .lock()
            .unwrap()
            .entry(queue.to_string())
            .or_default()
            .push_back(message.clone());
        self.enqueued
            .lock()
            .unwrap()
            .push((queue.to_string(), message.clone()));
        Ok(message.id.clone())
    }

    async fn dequeue(&self, queue: &str) -> JobFlowResult<Option<JobMessage>> {
        Ok(self
            .queues
            .lock()
            .unwrap()
            .get_mut(queue)
            .and_then(|q| q.pop_front()))
    }

    async fn queue_size(&self, queue: &str) -> JobFlowResult<u32> {
        Ok(self
            .queues
            .lock()
            .unwrap()
            .get(queue)
            .map(|q| q.len() as u32)
            .unwrap_or(0))
    }

    async fn purge(&self, queue: &str) -> JobFlowResult<()> {
        if let Some(q) = self.queues.lock().unwrap().get_mut(queue) {
            q.clear();
        }
        Ok(())
    }
}

/// Mock implementation of DistributedLock with scripted outcomes
#[derive(Debug, Clone)]
pub struct MockLock {
    /// Scripted per-call outcomes, consumed front to back
    script: Arc<Mutex<VecDeque<JobFlowResult<bool>>>>,
    /// Fallback once the script is exhausted
    default_acquired: bool,
    attempts: Arc<AtomicU32>,
}

impl MockLock {
    pub fn always_available() -> Self {
        Self::with_default(true)
    }

    pub fn always_held() -> Self {
        Self::with_default(false)
    }

    fn with_default(default_acquired: bool) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            default_acquired,
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn with_script(outcomes: Vec<JobFlowResult<bool>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(outcomes.into_iter().collect())),
            default_acquired: false,
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DistributedLock for MockLock {
    async fn try_acquire(&self, _key: &str, _ttl_seconds: u64) -> JobFlowResult<bool> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        match self.script.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => Ok(self.default_acquired),
        }
    }
}
