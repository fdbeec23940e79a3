use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{debug, error};

use crate::db;
use crate::errors::AppError;
use crate::models::{sort_descending, PricePoint};
use crate::services::trading_calendar::TradingCalendar;

/// Trading days of history loaded before the requested start date.
pub const LOOKBACK_TRADING_DAYS: i64 = 1000;
/// Trading days loaded after the requested end date (the forward half of the
/// top/bottom window).
pub const LOOKAHEAD_TRADING_DAYS: i64 = 20;
/// A window missing this many trading days or more is not usable.
const MAX_MISSING_DAYS: i64 = 3;

#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Adjusted closes for `symbol` in `[from, to]`.
    async fn fetch_range(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, AppError>;
}

pub struct PgPriceStore {
    pool: PgPool,
}

impl PgPriceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PriceStore for PgPriceStore {
    async fn fetch_range(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, AppError> {
        db::price_queries::fetch_range(&self.pool, symbol, from, to)
            .await
            .map_err(|e| {
                error!("Failed to fetch prices for {} between {} and {}: {}", symbol, from, to, e);
                AppError::Db(e)
            })
    }
}

/// Padded price history for one symbol, latest first.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    pub points: Vec<PricePoint>,
    /// False when the store is missing too many trading days for the padded span.
    pub is_complete: bool,
}

/// Loads `[from - 1000, to + 20]` trading days of prices and checks the result
/// against the calendar.
///
/// The expected length is capped at the latest closed trading day, so a window
/// reaching into the future is not penalised for sessions that have not happened.
pub async fn load_window(
    store: &dyn PriceStore,
    calendar: &dyn TradingCalendar,
    symbol: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<PriceWindow, AppError> {
    let padded_from = calendar.add_trading_days(from, -LOOKBACK_TRADING_DAYS);
    let padded_to = calendar.add_trading_days(to, LOOKAHEAD_TRADING_DAYS);

    let mut points = store.fetch_range(symbol, padded_from, padded_to).await?;
    sort_descending(&mut points);

    let last_trading_day = calendar.latest_trading_day();
    let theory_len = calendar.trading_day_count(padded_from, padded_to.min(last_trading_day));
    let is_complete = theory_len - (points.len() as i64) < MAX_MISSING_DAYS;

    debug!(
        "Loaded {} prices for {} ({} to {}), expected {}, complete: {}",
        points.len(), symbol, padded_from, padded_to, theory_len, is_complete
    );

    Ok(PriceWindow { points, is_complete })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::trading_calendar::NyseCalendar;

    struct FixedStore {
        points: Vec<PricePoint>,
    }

    #[async_trait]
    impl PriceStore for FixedStore {
        async fn fetch_range(
            &self,
            _symbol: &str,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<Vec<PricePoint>, AppError> {
            Ok(self
                .points
                .iter()
                .filter(|p| p.td >= from && p.td <= to)
                .copied()
                .collect())
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// Every trading day in `[from, to]`, oldest first.
    fn trading_days(cal: &NyseCalendar, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
        from.iter_days()
            .take_while(|day| *day <= to)
            .filter(|day| cal.is_trading_day(*day))
            .collect()
    }

    #[tokio::test]
    async fn test_complete_window_is_sorted_descending() {
        let cal = NyseCalendar::as_of(d(2024, 3, 8));
        let (from, to) = (d(2024, 3, 4), d(2024, 3, 8));
        let padded_from = cal.add_trading_days(from, -LOOKBACK_TRADING_DAYS);
        let points: Vec<PricePoint> = trading_days(&cal, padded_from, to)
            .into_iter()
            .map(|td| PricePoint::new(td, 100.0))
            .collect();

        let window = load_window(&FixedStore { points }, &cal, "AMD", from, to).await.unwrap();

        assert!(window.is_complete);
        assert_eq!(window.points.first().map(|p| p.td), Some(to));
        assert!(window.points.windows(2).all(|w| w[0].td > w[1].td));
    }

    #[tokio::test]
    async fn test_two_missing_days_still_complete() {
        let cal = NyseCalendar::as_of(d(2024, 3, 8));
        let (from, to) = (d(2024, 3, 4), d(2024, 3, 8));
        let padded_from = cal.add_trading_days(from, -LOOKBACK_TRADING_DAYS);
        let mut days = trading_days(&cal, padded_from, to);
        days.remove(100);
        days.remove(200);
        let points = days.into_iter().map(|td| PricePoint::new(td, 50.0)).collect();

        let window = load_window(&FixedStore { points }, &cal, "AMD", from, to).await.unwrap();
        assert!(window.is_complete);
    }

    #[tokio::test]
    async fn test_three_missing_days_is_incomplete() {
        let cal = NyseCalendar::as_of(d(2024, 3, 8));
        let (from, to) = (d(2024, 3, 4), d(2024, 3, 8));
        let padded_from = cal.add_trading_days(from, -LOOKBACK_TRADING_DAYS);
        let mut days = trading_days(&cal, padded_from, to);
        days.truncate(days.len() - 3);
        let points = days.into_iter().map(|td| PricePoint::new(td, 50.0)).collect();

        let window = load_window(&FixedStore { points }, &cal, "AMD", from, to).await.unwrap();
        assert!(!window.is_complete);
    }

    #[tokio::test]
    async fn test_short_history_is_incomplete() {
        let cal = NyseCalendar::as_of(d(2024, 3, 8));
        let (from, to) = (d(2024, 3, 4), d(2024, 3, 8));
        let points = trading_days(&cal, d(2023, 1, 3), to)
            .into_iter()
            .map(|td| PricePoint::new(td, 50.0))
            .collect();

        let window = load_window(&FixedStore { points }, &cal, "NEWCO", from, to).await.unwrap();
        assert!(!window.is_complete);
    }
}
