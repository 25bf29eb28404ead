use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::config::{is_valid_cron, job_cron, SchedulerConfig};
use crate::cycle::CycleOrchestrator;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub job_id: Option<Uuid>,
    pub cron_expression: String,
    pub started_at: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    /// Ticks dropped because the previous cycle was still running.
    pub skipped_count: u64,
    pub last_error: Option<String>,
}

/// Runs the cycle on a cron schedule inside the process. A tick that fires
/// while a cycle is still in progress is skipped.
pub struct CycleScheduler {
    scheduler: JobScheduler,
    orchestrator: Arc<CycleOrchestrator>,
    running: Arc<Mutex<()>>,
    stats: Arc<RwLock<SchedulerStats>>,
    config: SchedulerConfig,
}

impl CycleScheduler {
    pub async fn new(orchestrator: Arc<CycleOrchestrator>, config: SchedulerConfig) -> Result<Self> {
        if !is_valid_cron(&config.cron) {
            return Err(anyhow::anyhow!("Invalid cron expression: {}", config.cron));
        }
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            orchestrator,
            running: Arc::new(Mutex::new(())),
            stats: Arc::new(RwLock::new(SchedulerStats {
                cron_expression: config.cron.clone(),
                ..Default::default()
            })),
            config,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let running = Arc::clone(&self.running);
        let stats = Arc::clone(&self.stats);

        let expression = job_cron(&self.config.cron)
            .ok_or_else(|| anyhow::anyhow!("Invalid cron expression: {}", self.config.cron))?;
        let job = Job::new_async(expression.as_str(), move |_uuid, _l| {
            let orchestrator = Arc::clone(&orchestrator);
            let running = Arc::clone(&running);
            let stats = Arc::clone(&stats);
            Box::pin(async move {
                Self::tick(orchestrator, running, stats).await;
            })
        })?;

        let job_id = self.scheduler.add(job).await?;
        self.scheduler.start().await?;

        let mut stats = self.stats.write().await;
        stats.job_id = Some(job_id);
        stats.started_at = Some(Utc::now());
        tracing::info!("Cycle scheduler started with cron '{}'", self.config.cron);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        // Let an in-flight cycle finish before returning.
        let _guard = self.running.lock().await;
        tracing::info!("Cycle scheduler shutdown");
        Ok(())
    }

    pub async fn stats(&self) -> SchedulerStats {
        self.stats.read().await.clone()
    }

    /// Runs a cycle now, unless one is already in progress.
    pub async fn run_now(&self) -> bool {
        Self::tick(
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.running),
            Arc::clone(&self.stats),
        )
        .await
    }

    async fn tick(
        orchestrator: Arc<CycleOrchestrator>,
        running: Arc<Mutex<()>>,
        stats: Arc<RwLock<SchedulerStats>>,
    ) -> bool {
        let Ok(_guard) = running.try_lock() else {
            tracing::warn!("Previous cycle still running, skipping this tick");
            stats.write().await.skipped_count += 1;
            return false;
        };

        let result = orchestrator.run_cycle().await;

        let mut stats = stats.write().await;
        stats.last_run = Some(Utc::now());
        stats.run_count += 1;
        match result {
            Ok(report) if report.is_success() => {
                stats.success_count += 1;
                stats.last_error = None;
            }
            Ok(report) => {
                stats.error_count += 1;
                stats.last_error = report.failure();
            }
            Err(err) => {
                tracing::error!("Cycle aborted: {}", err);
                stats.error_count += 1;
                stats.last_error = Some(err.to_string());
            }
        }
        true
    }
}
