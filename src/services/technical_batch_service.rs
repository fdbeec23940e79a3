use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::db;
use crate::errors::AppError;
use crate::models::{DateFailure, TechnicalBatch, TechnicalRecord};
use crate::services::price_window::{self, PriceStore};
use crate::services::technical_service;
use crate::services::trading_calendar::TradingCalendar;
use crate::services::worker_pool::DatePool;

/// Range endpoints must fall inside these years; the padded window and the
/// calendar walk are sized for real market history.
const EARLIEST_YEAR: i32 = 1900;
const LATEST_YEAR: i32 = 2199;

/// Receives computed records; storage format is up to the implementation.
#[async_trait]
pub trait TechnicalSink: Send + Sync {
    /// Returns the number of rows written.
    async fn store(&self, records: &[TechnicalRecord]) -> Result<u64, AppError>;
}

pub struct PgTechnicalSink {
    pool: PgPool,
}

impl PgTechnicalSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TechnicalSink for PgTechnicalSink {
    async fn store(&self, records: &[TechnicalRecord]) -> Result<u64, AppError> {
        if records.is_empty() {
            return Ok(0);
        }
        db::technical_queries::upsert_many(&self.pool, records)
            .await
            .map_err(|e| {
                error!("Failed to store {} technical records: {}", records.len(), e);
                AppError::Db(e)
            })
    }
}

/// Computes technical records for one symbol over a date range.
#[derive(Clone)]
pub struct TechnicalBatchService {
    store: Arc<dyn PriceStore>,
    calendar: Arc<dyn TradingCalendar>,
    pool: Arc<dyn DatePool>,
}

impl TechnicalBatchService {
    pub fn new(
        store: Arc<dyn PriceStore>,
        calendar: Arc<dyn TradingCalendar>,
        pool: Arc<dyn DatePool>,
    ) -> Self {
        Self { store, calendar, pool }
    }

    pub fn calendar(&self) -> &dyn TradingCalendar {
        self.calendar.as_ref()
    }

    /// One record per trading date in `[from, to]` that has a price.
    ///
    /// An incomplete price window yields an empty batch rather than an error.
    /// Dates that fail are listed in `failures`; they do not stop the others.
    /// Records come back sorted by date, oldest first.
    pub async fn compute(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        symbol: &str,
    ) -> Result<TechnicalBatch, AppError> {
        validate_range(from, to)?;

        let window = price_window::load_window(
            self.store.as_ref(),
            self.calendar.as_ref(),
            symbol,
            from,
            to,
        )
        .await?;

        if !window.is_complete {
            info!("Insufficient price history for {} ({} to {}), skipping", symbol, from, to);
            return Ok(TechnicalBatch::empty(symbol));
        }

        let dates: Vec<NaiveDate> = window
            .points
            .iter()
            .map(|p| p.td)
            .filter(|td| from <= *td && *td <= to)
            .collect();

        if dates.is_empty() {
            return Ok(TechnicalBatch::empty(symbol));
        }

        let points = Arc::new(window.points);
        let calendar = self.calendar.clone();
        let pool = self.pool.clone();
        let owned_symbol = symbol.to_string();
        let computed_at = minute_timestamp(Utc::now());

        let outcomes = tokio::task::spawn_blocking(move || {
            let job = |td: NaiveDate| {
                technical_service::compute_record(&points, &owned_symbol, td, calendar.as_ref(), computed_at)
            };
            pool.map_dates(&dates, &job)
        })
        .await
        .map_err(|e| AppError::Worker(format!("technical batch for {} did not complete: {}", symbol, e)))?;

        let mut batch = TechnicalBatch::empty(symbol);
        for (td, outcome) in outcomes {
            match outcome {
                Ok(record) => batch.records.push(record),
                Err(e) => {
                    warn!("❌ Technical values for {} on {} failed: {}", symbol, td, e);
                    batch.failures.push(DateFailure { td, reason: e.to_string() });
                }
            }
        }
        batch.records.sort_by_key(|r| r.td);
        batch.failures.sort_by_key(|f| f.td);

        info!(
            "Computed {} technical records for {} ({} to {}), {} failed, {} workers",
            batch.records.len(), symbol, from, to, batch.failures.len(), self.pool.workers()
        );

        Ok(batch)
    }
}

fn validate_range(from: NaiveDate, to: NaiveDate) -> Result<(), AppError> {
    if from > to {
        return Err(AppError::Validation(format!("from ({}) is after to ({})", from, to)));
    }
    for day in [from, to] {
        if !(EARLIEST_YEAR..=LATEST_YEAR).contains(&day.year()) {
            return Err(AppError::Validation(format!(
                "{} is outside the supported years {} to {}",
                day, EARLIEST_YEAR, LATEST_YEAR
            )));
        }
    }
    Ok(())
}

fn minute_timestamp(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_minute_timestamp_truncates() {
        let at = Utc.with_ymd_and_hms(2024, 3, 8, 21, 30, 45).unwrap();
        let truncated = minute_timestamp(at);
        assert_eq!(truncated, Utc.with_ymd_and_hms(2024, 3, 8, 21, 30, 0).unwrap());
    }

    #[test]
    fn test_validate_range_bounds_years() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert!(validate_range(d(2024, 3, 4), d(2024, 3, 8)).is_ok());
        assert!(validate_range(d(1900, 1, 2), d(2199, 12, 31)).is_ok());
        assert!(matches!(validate_range(d(1899, 12, 29), d(2024, 3, 8)), Err(AppError::Validation(_))));
        assert!(matches!(validate_range(d(2024, 3, 4), NaiveDate::MAX), Err(AppError::Validation(_))));
    }
}
