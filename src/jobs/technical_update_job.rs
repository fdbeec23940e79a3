//! Technical Values Update Background Job
//!
//! Runs after the market close and recomputes the technical records of the
//! last few trading days for every symbol in the price table.
//!
//! # Job Schedule
//!
//! - **Production**: Weekdays at 21:30 UTC (0 30 21 * * MON-FRI)
//! - **Test Mode**: Every minute
//!
//! # Processing Strategy
//!
//! 1. Query all symbols from `stock_price`
//! 2. Resolve the date range ending at the latest closed trading day
//! 3. Compute each symbol's batch on the worker pool
//! 4. Upsert the records into `stock_technical`
//!
//! A symbol with too little history is skipped and still counts as processed.
//! A symbol counts as failed if its batch or its store call errors, or if any
//! of its dates failed.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::db;
use crate::errors::AppError;
use crate::services::job_scheduler_service::{JobContext, JobResult};
use crate::services::technical_batch_service::{TechnicalBatchService, TechnicalSink};
use crate::services::trading_calendar::TradingCalendar;

/// Main entry point for the technical update job.
pub async fn update_all_technicals(ctx: JobContext) -> Result<JobResult, AppError> {
    info!("📈 Updating technical values...");

    let symbols = db::price_queries::fetch_symbols(ctx.pool.as_ref()).await?;
    if symbols.is_empty() {
        info!("No symbols found to update");
        return Ok(JobResult::default());
    }

    let (from, to) = update_range(ctx.batch_service.calendar(), ctx.update_days);
    info!("Found {} symbols to process for {} to {}", symbols.len(), from, to);

    Ok(update_symbols(&ctx.batch_service, ctx.sink.as_ref(), &symbols, from, to).await)
}

/// The last `days` trading days up to the latest closed session.
pub fn update_range(calendar: &dyn TradingCalendar, days: i64) -> (NaiveDate, NaiveDate) {
    let to = calendar.latest_trading_day();
    let from = calendar.add_trading_days(to, -(days.max(1) - 1));
    (from, to)
}

/// Computes and stores every symbol in turn; one symbol's failure does not stop the rest.
pub async fn update_symbols(
    batch_service: &TechnicalBatchService,
    sink: &dyn TechnicalSink,
    symbols: &[String],
    from: NaiveDate,
    to: NaiveDate,
) -> JobResult {
    let mut result = JobResult::default();

    for symbol in symbols {
        let batch = match batch_service.compute(from, to, symbol).await {
            Ok(batch) => batch,
            Err(e) => {
                result.items_failed += 1;
                warn!("❌ Failed to compute technical values for {}: {}", symbol, e);
                continue;
            }
        };

        match sink.store(&batch.records).await {
            Ok(stored) if batch.failures.is_empty() => {
                result.items_processed += 1;
                info!("✅ Stored {} technical records for {}", stored, symbol);
            }
            Ok(stored) => {
                result.items_failed += 1;
                warn!(
                    "⚠️ Stored {} technical records for {}, {} dates failed",
                    stored, symbol, batch.failures.len()
                );
            }
            Err(e) => {
                result.items_failed += 1;
                warn!("❌ Failed to store technical values for {}: {}", symbol, e);
            }
        }
    }

    info!(
        "Technical update completed: {} processed, {} failed",
        result.items_processed, result.items_failed
    );

    result
}
