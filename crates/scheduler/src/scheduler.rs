use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use jobflow_domain::{
    entities::{JobType, NewJob, Schedule},
    locking::DistributedLock,
    messaging::{EnqueueOptions, JobMessage, JobQueue},
    repositories::{JobRepository, ScheduleRepository},
};
use jobflow_errors::JobFlowResult;

use crate::cron_utils::CronPlanner;

/// 调度器生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// 已注册的cron触发器，持有点火循环的任务句柄
struct CronTrigger {
    schedule_name: String,
    handle: JoinHandle<()>,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// cron实例化作业的默认重试上限
    pub default_max_retries: i32,
    /// 点火去重锁的租约时长（秒）
    pub fire_lock_ttl_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_max_retries: 3,
            fire_lock_ttl_seconds: 60,
        }
    }
}

/// 作业调度器
///
/// 为每个可调度的调度定义注册一个独立的点火循环；循环按cron表达式
/// 计算下一次点火时间并休眠到期，到期后实例化作业并投递到执行队列。
/// 多实例部署时通过可选的分布式锁对同一点火去重。
pub struct JobScheduler {
    schedule_repo: Arc<dyn ScheduleRepository>,
    job_repo: Arc<dyn JobRepository>,
    queue: Arc<dyn JobQueue>,
    lock: Option<Arc<dyn DistributedLock>>,
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    triggers: Mutex<HashMap<i64, CronTrigger>>,
}

impl JobScheduler {
    pub fn new(
        schedule_repo: Arc<dyn ScheduleRepository>,
        job_repo: Arc<dyn JobRepository>,
        queue: Arc<dyn JobQueue>,
        lock: Option<Arc<dyn DistributedLock>>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            schedule_repo,
            job_repo,
            queue,
            lock,
            config,
            state: Mutex::new(SchedulerState::Stopped),
            triggers: Mutex::new(HashMap::new()),
        }
    }

    pub async fn state(&self) -> SchedulerState {
        *self.state.lock().await
    }

    pub async fn trigger_count(&self) -> usize {
        self.triggers.lock().await.len()
    }

    /// 启动调度器并加载所有可调度的定义；重复调用为幂等
    pub async fn start(&self) -> JobFlowResult<()> {
        {
            let mut state = self.state.lock().await;
            if *state == SchedulerState::Running {
                debug!("调度器已在运行，忽略重复启动");
                return Ok(());
            }
            *state = SchedulerState::Running;
        }

        let schedules = self.schedule_repo.list_schedulable().await?;
        info!("调度器启动，加载 {} 个调度定义", schedules.len());

        // 单个定义的问题不阻断其余定义的注册
        for schedule in schedules {
            let id = schedule.id;
            if let Err(e) = self.schedule_job(id).await {
                error!("注册调度失败: id={} error={}", id, e);
            }
        }
        Ok(())
    }

    /// 停止调度器，撤销所有触发器；重复调用为幂等
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock().await;
            if *state == SchedulerState::Stopped {
                return;
            }
            *state = SchedulerState::Stopped;
        }

        let mut triggers = self.triggers.lock().await;
        for (id, trigger) in triggers.drain() {
            trigger.handle.abort();
            debug!("触发器已撤销: schedule_id={} name={}", id, trigger.schedule_name);
        }
        info!("调度器已停止");
    }

    /// 为指定调度注册触发器
    ///
    /// 定义缺失、未激活或无cron表达式时静默跳过（返回Ok），这让调用方
    /// 可以对任意ID无脑重注册。已有触发器时先撤销旧的再注册，换表达式
    /// 不会留下双触发。
    pub async fn schedule_job(&self, schedule_id: i64) -> JobFlowResult<()> {
        let schedule = match self.schedule_repo.get_by_id(schedule_id).await? {
            Some(schedule) => schedule,
            None => {
                debug!("调度不存在，跳过注册: id={}", schedule_id);
                return Ok(());
            }
        };
        if !schedule.is_schedulable() {
            debug!("调度未激活或无cron表达式，跳过注册: {}", schedule.entity_description());
            return Ok(());
        }
        // is_schedulable 已保证表达式存在
        let expr = match schedule.cron_expression.clone() {
            Some(expr) => expr,
            None => return Ok(()),
        };

        let planner = match CronPlanner::new(&expr, &schedule.timezone) {
            Ok(planner) => planner,
            Err(e) => {
                // 表达式坏了不该让整个加载流程失败，留给运维修数据
                warn!("cron表达式无效，跳过注册: {} error={}", schedule.entity_description(), e);
                return Ok(());
            }
        };
        let handle = self.spawn_fire_loop(schedule.clone(), planner);

        // 撤销与注册在同一把锁内完成，并发重注册不会产生双触发
        let mut triggers = self.triggers.lock().await;
        if let Some(old) = triggers.remove(&schedule_id) {
            old.handle.abort();
            debug!("旧触发器已替换: schedule_id={}", schedule_id);
        }
        triggers.insert(
            schedule_id,
            CronTrigger {
                schedule_name: schedule.name.clone(),
                handle,
            },
        );
        info!("触发器已注册: {} cron='{}'", schedule.entity_description(), expr);
        Ok(())
    }

    /// 撤销指定调度的触发器；无触发器时为空操作
    pub async fn unschedule_job(&self, schedule_id: i64) {
        let mut triggers = self.triggers.lock().await;
        if let Some(trigger) = triggers.remove(&schedule_id) {
            trigger.handle.abort();
            info!("触发器已撤销: schedule_id={} name={}", schedule_id, trigger.schedule_name);
        }
    }

    /// 将作业投递到执行队列（队列名即作业种类）
    pub async fn queue_job(
        &self,
        job_id: i64,
        job_name: &str,
        options: Option<EnqueueOptions>,
    ) -> JobFlowResult<String> {
        let message = JobMessage::new(job_id, job_name);
        let message_id = self.queue.enqueue(job_name, &message, options).await?;
        debug!(
            "作业已投递: job_id={} queue={} message_id={}",
            job_id, job_name, message_id
        );
        Ok(message_id)
    }

    fn spawn_fire_loop(&self, schedule: Schedule, planner: CronPlanner) -> JoinHandle<()> {
        let job_repo = self.job_repo.clone();
        let queue = self.queue.clone();
        let lock = self.lock.clone();
        let default_max_retries = self.config.default_max_retries;
        let lock_ttl = self.config.fire_lock_ttl_seconds;

        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let fire_at = match planner.next_fire(now) {
                    Some(t) => t,
                    None => {
                        warn!("cron无后续点火时间，触发循环退出: {}", schedule.entity_description());
                        break;
                    }
                };

                let wait = (fire_at - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                // 多实例去重：锁未取到说明别的实例已点火
                if let Some(lock) = &lock {
                    let key = format!("jobflow:fire:{}:{}", schedule.id, fire_at.timestamp());
                    match lock.try_acquire(&key, lock_ttl).await {
                        Ok(true) => {}
                        Ok(false) => {
                            debug!("点火已被其他实例认领: {}", key);
                            continue;
                        }
                        Err(e) => {
                            // 锁后端不可用时宁可重复点火也不整体停摆
                            warn!("点火锁不可用，继续点火: key={} error={}", key, e);
                        }
                    }
                }

                if let Err(e) = Self::fire(
                    &*job_repo,
                    &*queue,
                    &schedule,
                    default_max_retries,
                )
                .await
                {
                    error!("调度点火失败: {} error={}", schedule.entity_description(), e);
                }
            }
        })
    }

    /// 单次点火：实例化作业并投递
    async fn fire(
        job_repo: &dyn JobRepository,
        queue: &dyn JobQueue,
        schedule: &Schedule,
        default_max_retries: i32,
    ) -> JobFlowResult<()> {
        let new_job = NewJob::new(&schedule.job_name, JobType::Cron)
            .with_payload(json!({
                "schedule_id": schedule.id,
                "schedule_name": schedule.name,
            }))
            .with_max_retries(default_max_retries);

        let job = job_repo.create(&new_job).await?;
        let message = JobMessage::new(job.id, &job.name);
        let message_id = queue.enqueue(&job.name, &message, None).await?;
        info!(
            "调度点火: {} job_id={} message_id={}",
            schedule.entity_description(),
            job.id,
            message_id
        );
        Ok(())
    }
}
