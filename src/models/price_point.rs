use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One adjusted close for a trading day.
///
/// Lists of these are kept sorted by `td` descending (latest first) wherever they
/// feed the technical computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PricePoint {
    pub td: NaiveDate,
    pub adj_close: f64,
}

impl PricePoint {
    pub fn new(td: NaiveDate, adj_close: f64) -> Self {
        Self { td, adj_close }
    }
}

/// Body of a price import request.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportPrices {
    pub points: Vec<PricePoint>,
}

/// Sorts points latest-first, the order every technical step expects.
pub fn sort_descending(points: &mut [PricePoint]) {
    points.sort_by(|a, b| b.td.cmp(&a.td));
}
