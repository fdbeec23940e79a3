//! Per-date technical values.
//!
//! Every function here takes the symbol's price history sorted latest-first and
//! is a pure function of its inputs; `compute_record` builds a fresh
//! `TechnicalRecord` on every call.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::models::{PricePoint, TechnicalRecord};
use crate::services::indicators::{latest_rsi, quantile, rolling_changes, round_to, steepness};
use crate::services::trading_calendar::TradingCalendar;

const RSI_PERIOD: usize = 14;
const BAND_UPPER_QUANTILE: f64 = 0.98;
const BAND_LOWER_QUANTILE: f64 = 0.02;
/// Prices feeding the 20-day change distribution (400 changes plus the anchor span).
const BAND_20_WINDOW: usize = 421;
const BAND_50_WINDOW: usize = 451;
/// Half-width of the top/bottom window, exclusive on both ends.
const EXTREMUM_REACH: i64 = 21;
/// Comparison points needed before top/bottom flags are reported.
const MIN_EXTREMUM_POINTS: usize = 39;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TechnicalError {
    #[error("no price on or before {0}")]
    TargetDateMissing(NaiveDate),
    #[error("invalid adjusted close {price} on {td}")]
    InvalidPrice { td: NaiveDate, price: f64 },
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Prices up to the target date plus the RSI readings taken from them.
#[derive(Debug, Clone)]
pub struct RsiSnapshot<'a> {
    /// Points on or before the target date, latest first.
    pub td_points: &'a [PricePoint],
    pub td_prices: Vec<f64>,
    pub rsi: Option<f64>,
    pub weekly_rsi: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnchorPrices {
    pub price: Option<f64>,
    pub p20: Option<f64>,
    pub p50: Option<f64>,
    pub p125: Option<f64>,
    pub p200: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TargetBands {
    pub increase_20: Option<f64>,
    pub decrease_20: Option<f64>,
    pub increase_50: Option<f64>,
    pub decrease_50: Option<f64>,
    pub best_20: Option<f64>,
    pub worst_20: Option<f64>,
    pub best_50: Option<f64>,
    pub worst_50: Option<f64>,
}

/// Drops everything newer than `td` and takes daily and weekly RSI(14).
///
/// The weekly series is the target-date close followed by each earlier weekly close.
pub fn prices_rsi<'a>(
    points: &'a [PricePoint],
    td: NaiveDate,
    calendar: &dyn TradingCalendar,
) -> RsiSnapshot<'a> {
    let start = points.iter().position(|p| p.td <= td).unwrap_or(points.len());
    let td_points = &points[start..];
    let td_prices: Vec<f64> = td_points.iter().map(|p| p.adj_close).collect();

    let weekly_prices: Vec<f64> = weekly_series(td_points, calendar)
        .iter()
        .map(|p| p.adj_close)
        .collect();

    RsiSnapshot {
        td_points,
        rsi: latest_rsi(RSI_PERIOD, &td_prices),
        weekly_rsi: latest_rsi(RSI_PERIOD, &weekly_prices),
        td_prices,
    }
}

/// The head point followed by every earlier weekly close, latest first.
pub fn weekly_series(td_points: &[PricePoint], calendar: &dyn TradingCalendar) -> Vec<PricePoint> {
    td_points
        .iter()
        .take(1)
        .chain(td_points.iter().skip(1).filter(|p| calendar.is_weekly_close(p.td)))
        .copied()
        .collect()
}

/// Prices 0, 20, 50, 125 and 200 trading days back from the head of the list.
pub fn anchor_prices(prices: &[f64]) -> AnchorPrices {
    AnchorPrices {
        price: prices.first().copied(),
        p20: prices.get(20).copied(),
        p50: prices.get(50).copied(),
        p125: prices.get(125).copied(),
        p200: prices.get(200).copied(),
    }
}

/// Best/worst projections from the 98th/2nd percentile of historical 20- and
/// 50-day changes, applied to the price 20 and 50 days back.
pub fn target_bands(p20: Option<f64>, p50: Option<f64>, prices: &[f64]) -> TargetBands {
    let changes_20 = rolling_changes(20, &prices[..prices.len().min(BAND_20_WINDOW)]);
    let changes_50 = rolling_changes(50, &prices[..prices.len().min(BAND_50_WINDOW)]);

    let increase_20 = quantile(BAND_UPPER_QUANTILE, &changes_20);
    let decrease_20 = quantile(BAND_LOWER_QUANTILE, &changes_20);
    let increase_50 = quantile(BAND_UPPER_QUANTILE, &changes_50);
    let decrease_50 = quantile(BAND_LOWER_QUANTILE, &changes_50);

    let project = |anchor: Option<f64>, change: Option<f64>| Some(anchor? * (1.0 + change?));

    TargetBands {
        increase_20,
        decrease_20,
        increase_50,
        decrease_50,
        best_20: project(p20, increase_20),
        worst_20: project(p20, decrease_20),
        best_50: project(p50, increase_50),
        worst_50: project(p50, decrease_50),
    }
}

pub fn steep_20_50(prices: &[f64]) -> (Option<f64>, Option<f64>) {
    (steepness(20, prices), steepness(50, prices))
}

/// Whether the target close is the strict high / strict low of the surrounding
/// ±20 trading days. `None` when the window is too thin to say.
pub fn top_bottom(
    points: &[PricePoint],
    td_price: Option<f64>,
    td: NaiveDate,
    calendar: &dyn TradingCalendar,
) -> (Option<bool>, Option<bool>) {
    let Some(td_price) = td_price else {
        return (None, None);
    };

    let lower = calendar.add_trading_days(td, -EXTREMUM_REACH);
    let upper = calendar.add_trading_days(td, EXTREMUM_REACH);
    let neighbours: Vec<f64> = points
        .iter()
        .filter(|p| lower < p.td && p.td < upper && p.td != td)
        .map(|p| p.adj_close)
        .collect();

    if neighbours.len() < MIN_EXTREMUM_POINTS {
        return (None, None);
    }

    let is_top = neighbours.iter().all(|&p| td_price > p);
    let is_bottom = neighbours.iter().all(|&p| td_price < p);
    (Some(is_top), Some(is_bottom))
}

/// Computes the full record for `symbol` on `td`.
///
/// Fails when `td` itself has no price or when any close on or before `td` is
/// not a finite positive number.
pub fn compute_record(
    points: &[PricePoint],
    symbol: &str,
    td: NaiveDate,
    calendar: &dyn TradingCalendar,
    computed_at: DateTime<Utc>,
) -> Result<TechnicalRecord, TechnicalError> {
    let snapshot = prices_rsi(points, td, calendar);
    match snapshot.td_points.first() {
        Some(head) if head.td == td => {}
        _ => return Err(TechnicalError::TargetDateMissing(td)),
    }
    validate_prices(snapshot.td_points)?;

    let anchors = anchor_prices(&snapshot.td_prices);
    let bands = target_bands(anchors.p20, anchors.p50, &snapshot.td_prices);
    let (steep_20, steep_50) = steep_20_50(&snapshot.td_prices);
    let (is_top, is_bottom) = top_bottom(points, anchors.price, td, calendar);

    Ok(TechnicalRecord {
        symbol: symbol.to_string(),
        td,
        t: computed_at,

        price: round_to(anchors.price, 2),
        p20: round_to(anchors.p20, 2),
        p50: round_to(anchors.p50, 2),
        p125: round_to(anchors.p125, 2),
        p200: round_to(anchors.p200, 2),

        rsi: round_to(snapshot.rsi, 4),
        weekly_rsi: round_to(snapshot.weekly_rsi, 4),

        increase_20: round_to(bands.increase_20, 2),
        decrease_20: round_to(bands.decrease_20, 2),
        increase_50: round_to(bands.increase_50, 2),
        decrease_50: round_to(bands.decrease_50, 2),
        best_20: round_to(bands.best_20, 1),
        worst_20: round_to(bands.worst_20, 1),
        best_50: round_to(bands.best_50, 1),
        worst_50: round_to(bands.worst_50, 1),

        steep_20: round_to(steep_20, 2),
        steep_50: round_to(steep_50, 2),

        is_top,
        is_bottom,
    })
}

fn validate_prices(points: &[PricePoint]) -> Result<(), TechnicalError> {
    match points.iter().find(|p| !p.adj_close.is_finite() || p.adj_close <= 0.0) {
        Some(bad) => Err(TechnicalError::InvalidPrice { td: bad.td, price: bad.adj_close }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::trading_calendar::NyseCalendar;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// `len` trading days ending at `end`, latest first; `price(i)` gets the
    /// chronological index (0 = oldest).
    fn series(
        cal: &dyn TradingCalendar,
        end: NaiveDate,
        len: usize,
        price: impl Fn(usize) -> f64,
    ) -> Vec<PricePoint> {
        (0..len)
            .map(|back| {
                let td = cal.add_trading_days(end, -(back as i64));
                PricePoint::new(td, price(len - 1 - back))
            })
            .collect()
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_increasing_series_latest_date() {
        let cal = NyseCalendar::new();
        let end = d(2024, 3, 8);
        let points = series(&cal, end, 300, |i| 10.0 + i as f64);

        let record = compute_record(&points, "UP", end, &cal, now()).unwrap();

        let (price, p20, p50) = (record.price.unwrap(), record.p20.unwrap(), record.p50.unwrap());
        assert!(price > p20 && p20 > p50);
        assert_eq!(record.rsi, Some(100.0));
        assert_eq!(record.weekly_rsi, Some(100.0));
        assert!(record.steep_20.unwrap() > 0.0);
        // nothing after the latest date, so the ±20 window is only half full
        assert_eq!(record.is_top, None);
        assert_eq!(record.is_bottom, None);
    }

    #[test]
    fn test_flat_series() {
        let cal = NyseCalendar::new();
        let end = d(2024, 3, 8);
        let points = series(&cal, end, 300, |_| 42.0);
        let td = cal.add_trading_days(end, -25);

        let record = compute_record(&points, "FLAT", td, &cal, now()).unwrap();

        assert_eq!(record.rsi, None);
        assert_eq!(record.weekly_rsi, None);
        assert_eq!(record.steep_20, Some(0.0));
        assert_eq!(record.steep_50, Some(0.0));
        assert_eq!(record.is_top, Some(false));
        assert_eq!(record.is_bottom, Some(false));
        assert_eq!(record.best_20, Some(42.0));
        assert_eq!(record.worst_50, Some(42.0));
    }

    #[test]
    fn test_peak_is_top() {
        let cal = NyseCalendar::new();
        let end = d(2024, 3, 8);
        // rises for 250 days, then falls for 49
        let points = series(&cal, end, 300, |i| if i <= 250 { 50.0 + i as f64 } else { 300.0 - (i - 250) as f64 });
        let peak = cal.add_trading_days(end, -49);

        let record = compute_record(&points, "PEAK", peak, &cal, now()).unwrap();
        assert_eq!(record.is_top, Some(true));
        assert_eq!(record.is_bottom, Some(false));
        assert_eq!(record.price, Some(300.0));
    }

    #[test]
    fn test_trough_is_bottom() {
        let cal = NyseCalendar::new();
        let end = d(2024, 3, 8);
        let points = series(&cal, end, 300, |i| if i <= 250 { 400.0 - i as f64 } else { 150.0 + (i - 250) as f64 });
        let trough = cal.add_trading_days(end, -49);

        let (is_top, is_bottom) = top_bottom(&points, Some(150.0), trough, &cal);
        assert_eq!(is_top, Some(false));
        assert_eq!(is_bottom, Some(true));
    }

    #[test]
    fn test_top_and_bottom_never_both_true() {
        let cal = NyseCalendar::new();
        let end = d(2024, 3, 8);
        let points = series(&cal, end, 200, |i| 100.0 + ((i as f64) * 0.7).sin() * 10.0);
        for back in 21..150 {
            let td = cal.add_trading_days(end, -back);
            let price = points.iter().find(|p| p.td == td).map(|p| p.adj_close);
            let (is_top, is_bottom) = top_bottom(&points, price, td, &cal);
            assert!(!(is_top == Some(true) && is_bottom == Some(true)));
        }
    }

    #[test]
    fn test_thin_window_gives_unknown_flags() {
        let cal = NyseCalendar::new();
        let end = d(2024, 3, 8);
        let mut points = series(&cal, end, 100, |i| i as f64 + 1.0);
        let td = cal.add_trading_days(end, -40);
        // 38 neighbours left after removing two
        points.retain(|p| p.td != cal.add_trading_days(td, 3) && p.td != cal.add_trading_days(td, -3));

        assert_eq!(top_bottom(&points, Some(60.0), td, &cal), (None, None));
        assert_eq!(top_bottom(&points, None, end, &cal), (None, None));
    }

    #[test]
    fn test_prices_rsi_drops_newer_points() {
        let cal = NyseCalendar::new();
        let end = d(2024, 3, 8);
        let points = series(&cal, end, 60, |i| 20.0 + i as f64);
        let td = d(2024, 3, 1);

        let snapshot = prices_rsi(&points, td, &cal);
        assert_eq!(snapshot.td_points.first().map(|p| p.td), Some(td));
        assert_eq!(snapshot.td_prices.len(), points.len() - 5);
        assert_eq!(snapshot.rsi, Some(100.0));
        // 60 trading days hold only ~12 weekly closes: not enough for RSI(14)
        assert_eq!(snapshot.weekly_rsi, None);
    }

    #[test]
    fn test_weekly_series_across_good_friday() {
        let cal = NyseCalendar::new();
        let td = d(2024, 4, 10);
        let points = series(&cal, td, 30, |i| 20.0 + i as f64);

        let weekly: Vec<NaiveDate> = weekly_series(&points, &cal).iter().map(|p| p.td).collect();
        // Good Friday 2024-03-29 closes the market, so that week ends on Thursday
        assert_eq!(
            weekly,
            vec![
                d(2024, 4, 10),
                d(2024, 4, 5),
                d(2024, 3, 28),
                d(2024, 3, 22),
                d(2024, 3, 15),
                d(2024, 3, 8),
                d(2024, 3, 1),
            ]
        );
    }

    #[test]
    fn test_weekly_rsi_uses_weekly_closes_only() {
        let cal = NyseCalendar::new();
        let end = d(2024, 3, 8);
        // weekly closes rise while the days in between drop sharply
        let points: Vec<PricePoint> = series(&cal, end, 200, |i| 10.0 + i as f64)
            .into_iter()
            .map(|p| {
                if cal.is_weekly_close(p.td) || p.td == end {
                    p
                } else {
                    PricePoint::new(p.td, 1.0)
                }
            })
            .collect();

        let snapshot = prices_rsi(&points, end, &cal);
        assert_eq!(snapshot.weekly_rsi, Some(100.0));
        assert!(snapshot.rsi.unwrap() < 100.0);
    }

    #[test]
    fn test_short_history_rsi_is_none() {
        let cal = NyseCalendar::new();
        let end = d(2024, 3, 8);
        let points = series(&cal, end, 14, |i| 20.0 + i as f64);
        let snapshot = prices_rsi(&points, end, &cal);
        assert_eq!(snapshot.rsi, None);
    }

    #[test]
    fn test_anchor_prices_beyond_history() {
        let prices: Vec<f64> = (0..60).map(|i| i as f64).collect();
        let anchors = anchor_prices(&prices);
        assert_eq!(anchors.price, Some(0.0));
        assert_eq!(anchors.p20, Some(20.0));
        assert_eq!(anchors.p50, Some(50.0));
        assert_eq!(anchors.p125, None);
        assert_eq!(anchors.p200, None);
    }

    #[test]
    fn test_band_nulls_are_independent() {
        let prices: Vec<f64> = (0..460).map(|i| 100.0 + (i as f64 * 0.1).cos() * 5.0).collect();

        let only_50 = target_bands(None, Some(100.0), &prices);
        assert_eq!(only_50.best_20, None);
        assert_eq!(only_50.worst_20, None);
        assert!(only_50.best_50.is_some());
        assert!(only_50.worst_50.is_some());

        let only_20 = target_bands(Some(100.0), None, &prices);
        assert!(only_20.best_20.is_some());
        assert!(only_20.worst_20.is_some());
        assert_eq!(only_20.best_50, None);
        assert_eq!(only_20.worst_50, None);
    }

    #[test]
    fn test_band_projection() {
        // latest-first: each day 1% above the previous one
        let prices: Vec<f64> = (0..460).map(|i| 100.0 * 1.01f64.powi(-i)).collect();
        let bands = target_bands(Some(80.0), Some(60.0), &prices);

        let change_20 = 1.01f64.powi(20) - 1.0;
        assert!((bands.increase_20.unwrap() - change_20).abs() < 1e-9);
        assert!((bands.decrease_20.unwrap() - change_20).abs() < 1e-9);
        assert!((bands.best_20.unwrap() - 80.0 * (1.0 + change_20)).abs() < 1e-9);
        assert!(bands.best_50.unwrap() > bands.best_20.unwrap());
    }

    #[test]
    fn test_missing_target_date_fails() {
        let cal = NyseCalendar::new();
        let end = d(2024, 3, 8);
        let points = series(&cal, end, 50, |i| 20.0 + i as f64);

        let err = compute_record(&points, "AMD", d(2024, 3, 9), &cal, now()).unwrap_err();
        assert_eq!(err, TechnicalError::TargetDateMissing(d(2024, 3, 9)));
    }

    #[test]
    fn test_invalid_price_fails_only_dates_that_read_it() {
        let cal = NyseCalendar::new();
        let end = d(2024, 3, 8);
        let mut points = series(&cal, end, 80, |i| 20.0 + i as f64);
        let bad_day = cal.add_trading_days(end, -2);
        points[2].adj_close = f64::NAN;

        let err = compute_record(&points, "AMD", end, &cal, now()).unwrap_err();
        assert!(matches!(err, TechnicalError::InvalidPrice { td, .. } if td == bad_day));

        let earlier = cal.add_trading_days(end, -3);
        assert!(compute_record(&points, "AMD", earlier, &cal, now()).is_ok());
    }

    #[test]
    fn test_records_are_independent() {
        let cal = NyseCalendar::new();
        let end = d(2024, 3, 8);
        let points = series(&cal, end, 300, |i| 10.0 + i as f64);
        let at = now();

        let first = compute_record(&points, "A", end, &cal, at).unwrap();
        let second = compute_record(&points, "B", cal.add_trading_days(end, -1), &cal, at).unwrap();
        let again = compute_record(&points, "A", end, &cal, at).unwrap();

        assert_eq!(first, again);
        assert_eq!(second.symbol, "B");
        assert_ne!(first.price, second.price);
    }
}
