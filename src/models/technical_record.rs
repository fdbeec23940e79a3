use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Derived technical metrics for one symbol on one trading date.
///
/// Any metric whose lookback is not covered by the available history is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TechnicalRecord {
    pub symbol: String,
    pub td: NaiveDate,
    /// Computation timestamp, truncated to the minute.
    pub t: DateTime<Utc>,

    pub price: Option<f64>,
    pub p20: Option<f64>,
    pub p50: Option<f64>,
    pub p125: Option<f64>,
    pub p200: Option<f64>,

    pub rsi: Option<f64>,
    pub weekly_rsi: Option<f64>,

    pub increase_20: Option<f64>,
    pub decrease_20: Option<f64>,
    pub increase_50: Option<f64>,
    pub decrease_50: Option<f64>,
    pub best_20: Option<f64>,
    pub worst_20: Option<f64>,
    pub best_50: Option<f64>,
    pub worst_50: Option<f64>,

    pub steep_20: Option<f64>,
    pub steep_50: Option<f64>,

    pub is_top: Option<bool>,
    pub is_bottom: Option<bool>,
}

/// A trading date whose computation failed; the rest of its batch still completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateFailure {
    pub td: NaiveDate,
    pub reason: String,
}

/// Outcome of computing one symbol over a date range.
#[derive(Debug, Clone, Serialize)]
pub struct TechnicalBatch {
    pub symbol: String,
    pub records: Vec<TechnicalRecord>,
    pub failures: Vec<DateFailure>,
}

impl TechnicalBatch {
    pub fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            records: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.failures.is_empty()
    }
}

/// Response body for a refresh request.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub symbol: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub records_stored: u64,
    pub failures: Vec<DateFailure>,
}
