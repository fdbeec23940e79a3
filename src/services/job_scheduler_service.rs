use crate::errors::AppError;
use crate::jobs::technical_update_job;
use crate::services::technical_batch_service::{TechnicalBatchService, TechnicalSink};
use sqlx::PgPool;
use tokio_cron_scheduler::{JobScheduler, Job};
use tracing::{info, error};
use chrono::Utc;
use std::sync::Arc;

/// `job_runs` rows older than this are deleted by the weekly prune.
pub const JOB_RUN_RETENTION_DAYS: i32 = 90;
const PRUNE_SCHEDULE: &str = "0 0 3 * * SUN";

// Context passed to job functions
#[derive(Clone)]
pub struct JobContext {
    pub pool: Arc<PgPool>,
    pub batch_service: Arc<TechnicalBatchService>,
    pub sink: Arc<dyn TechnicalSink>,
    /// Trailing trading days recomputed on each update run.
    pub update_days: i64,
}

pub struct JobSchedulerService {
    scheduler: JobScheduler,
    context: JobContext,
    test_mode: bool,
}

impl JobSchedulerService {
    pub async fn new(context: JobContext, test_mode: bool) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::External(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            context,
            test_mode,
        })
    }

    /// Start all scheduled jobs
    pub async fn start(&mut self) -> Result<(), AppError> {
        info!("🚀 Starting job scheduler...");

        if self.test_mode {
            info!("⚠️  JOB SCHEDULER IN TEST MODE - Jobs will run every minute!");
        }

        let (update_schedule, update_desc) = update_schedule(self.test_mode);

        self.schedule_job(
            update_schedule,
            "update_technicals",
            update_desc,
            technical_update_job::update_all_technicals
        ).await?;

        self.schedule_job(
            PRUNE_SCHEDULE,
            "prune_job_runs",
            "Every Sunday at 3:00 AM",
            prune_job_runs
        ).await?;

        self.scheduler.start()
            .await
            .map_err(|e| AppError::External(format!("Failed to start scheduler: {}", e)))?;

        info!("✅ Job scheduler started successfully with 2 jobs");
        Ok(())
    }

    /// Stop the scheduler gracefully
    pub async fn stop(&mut self) -> Result<(), AppError> {
        info!("🛑 Stopping job scheduler...");
        self.scheduler.shutdown()
            .await
            .map_err(|e| AppError::External(format!("Failed to stop scheduler: {}", e)))?;
        info!("✅ Job scheduler stopped");
        Ok(())
    }

    async fn schedule_job<F, Fut>(
        &mut self,
        schedule: &str,
        job_name: &'static str,
        description: &str,
        job_fn: F,
    ) -> Result<(), AppError>
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<JobResult, AppError>> + Send + 'static,
    {
        let context = self.context.clone();
        let job_fn = Arc::new(job_fn);

        let job = Job::new_async(schedule, move |_uuid, _l| {
            let context = context.clone();
            let job_fn = job_fn.clone();
            Box::pin(async move {
                execute_job_with_tracking(&context.pool, job_name, context.clone(), job_fn).await;
            })
        })
        .map_err(|e| AppError::External(format!("Failed to create job {}: {}", job_name, e)))?;

        self.scheduler.add(job)
            .await
            .map_err(|e| AppError::External(format!("Failed to add job {}: {}", job_name, e)))?;

        info!("📅 Scheduled: {} - {} [cron: {}]", job_name, description, schedule);
        Ok(())
    }
}

// format: sec min hour day month weekday (UTC); 21:30 UTC is after the NYSE close all year
fn update_schedule(test_mode: bool) -> (&'static str, &'static str) {
    if test_mode {
        ("0 */1 * * * *", "Every minute (TEST MODE)")
    } else {
        ("0 30 21 * * MON-FRI", "Weekdays at 21:30 UTC")
    }
}

// Job tracking wrapper
async fn execute_job_with_tracking<F, Fut>(
    pool: &PgPool,
    job_name: &str,
    context: JobContext,
    job_fn: Arc<F>,
) where
    F: Fn(JobContext) -> Fut,
    Fut: std::future::Future<Output = Result<JobResult, AppError>>,
{
    info!("🏃 Starting job: {}", job_name);
    let started_at = Utc::now();

    let job_id = match record_job_start(pool, job_name).await {
        Ok(id) => id,
        Err(e) => {
            error!("Failed to record job start: {}", e);
            return;
        }
    };

    let result = job_fn(context).await;

    let duration_ms = (Utc::now() - started_at).num_milliseconds();

    match result {
        Ok(job_result) => {
            info!(
                "✅ Job completed: {} (processed: {}, failed: {}, duration: {}ms)",
                job_name, job_result.items_processed, job_result.items_failed, duration_ms
            );

            if let Err(e) = record_job_success(
                pool,
                job_id,
                job_result.items_processed,
                job_result.items_failed,
                duration_ms,
            ).await {
                error!("Failed to record job success: {}", e);
            }
        }
        Err(e) => {
            error!("❌ Job failed: {} - {}", job_name, e);

            if let Err(e) = record_job_failure(pool, job_id, &e.to_string(), duration_ms).await {
                error!("Failed to record job failure: {}", e);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobResult {
    pub items_processed: i32,
    pub items_failed: i32,
}

async fn record_job_start(pool: &PgPool, job_name: &str) -> Result<i32, AppError> {
    let id = sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO job_runs (job_name, status)
        VALUES ($1, 'running'::job_status)
        RETURNING id
        "#,
    )
    .bind(job_name)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

async fn record_job_success(
    pool: &PgPool,
    job_id: i32,
    items_processed: i32,
    items_failed: i32,
    duration_ms: i64,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE job_runs
        SET completed_at = NOW(),
            status = 'success'::job_status,
            items_processed = $2,
            items_failed = $3,
            duration_ms = $4
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .bind(items_processed)
    .bind(items_failed)
    .bind(duration_ms)
    .execute(pool)
    .await?;

    Ok(())
}

async fn record_job_failure(
    pool: &PgPool,
    job_id: i32,
    error_message: &str,
    duration_ms: i64,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE job_runs
        SET completed_at = NOW(),
            status = 'failed'::job_status,
            error_message = $2,
            duration_ms = $3
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .bind(error_message)
    .bind(duration_ms)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn prune_job_runs(ctx: JobContext) -> Result<JobResult, AppError> {
    info!("🧹 Pruning old job runs...");

    let result = sqlx::query("DELETE FROM job_runs WHERE started_at < NOW() - make_interval(days => $1)")
        .bind(JOB_RUN_RETENTION_DAYS)
        .execute(ctx.pool.as_ref())
        .await?;

    let processed = result.rows_affected() as i32;
    info!("🗑️ Deleted {} job run records", processed);

    Ok(JobResult { items_processed: processed, items_failed: 0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepts(schedule: &str) -> bool {
        Job::new_async(schedule, |_uuid, _l| Box::pin(async move {})).is_ok()
    }

    #[tokio::test]
    async fn test_schedules_are_valid_cron() {
        assert!(accepts(update_schedule(false).0));
        assert!(accepts(update_schedule(true).0));
        assert!(accepts(PRUNE_SCHEDULE));
    }

    #[test]
    fn test_update_runs_on_weekdays_only() {
        let (schedule, _) = update_schedule(false);
        assert!(schedule.ends_with("MON-FRI"));
        assert_eq!(update_schedule(true).0, "0 */1 * * * *");
    }
}
