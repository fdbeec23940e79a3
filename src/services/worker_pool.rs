use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::models::TechnicalRecord;
use crate::services::technical_service::TechnicalError;

pub type DateOutcome = (NaiveDate, Result<TechnicalRecord, TechnicalError>);

/// Per-date work; must be callable from several threads at once.
pub type DateJob<'a> = dyn Fn(NaiveDate) -> Result<TechnicalRecord, TechnicalError> + Sync + 'a;

/// Runs one independent job per trading date.
///
/// Every date yields an outcome: a panicking job is reported as
/// `TechnicalError::WorkerPanicked` for that date and the others still run.
/// Outcome order is unspecified.
pub trait DatePool: Send + Sync {
    fn map_dates(&self, dates: &[NaiveDate], job: &DateJob<'_>) -> Vec<DateOutcome>;

    fn workers(&self) -> usize;
}

/// Runs every job on the calling thread, in input order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialPool;

impl DatePool for SequentialPool {
    fn map_dates(&self, dates: &[NaiveDate], job: &DateJob<'_>) -> Vec<DateOutcome> {
        dates.iter().map(|&td| (td, run_isolated(job, td))).collect()
    }

    fn workers(&self) -> usize {
        1
    }
}

/// Fixed-size rayon pool for production batches.
pub struct ParallelPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl ParallelPool {
    pub fn new(workers: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("technical-worker-{}", i))
            .build()?;
        Ok(Self { pool, workers })
    }

    /// One worker per available CPU.
    pub fn with_available_cpus() -> Result<Self, rayon::ThreadPoolBuildError> {
        Self::new(num_cpus::get())
    }
}

impl DatePool for ParallelPool {
    fn map_dates(&self, dates: &[NaiveDate], job: &DateJob<'_>) -> Vec<DateOutcome> {
        self.pool.install(|| {
            dates
                .par_iter()
                .map(|&td| (td, run_isolated(job, td)))
                .collect()
        })
    }

    fn workers(&self) -> usize {
        self.workers
    }
}

fn run_isolated(job: &DateJob<'_>, td: NaiveDate) -> Result<TechnicalRecord, TechnicalError> {
    catch_unwind(AssertUnwindSafe(|| job(td)))
        .unwrap_or_else(|payload| Err(TechnicalError::WorkerPanicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
