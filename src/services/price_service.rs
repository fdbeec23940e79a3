use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{error, info};

use crate::db;
use crate::errors::AppError;
use crate::models::{sort_descending, PricePoint, TechnicalRecord};

pub fn normalize_symbol(symbol: &str) -> Result<String, AppError> {
    let symbol = symbol.trim().to_uppercase();
    let valid = !symbol.is_empty()
        && symbol.len() <= 12
        && symbol.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if valid {
        Ok(symbol)
    } else {
        Err(AppError::Validation(format!("invalid symbol: {:?}", symbol)))
    }
}

/// Rejects empty imports, duplicate dates and prices that are not finite and positive.
pub fn validate_import(points: &mut [PricePoint]) -> Result<(), AppError> {
    if points.is_empty() {
        return Err(AppError::Validation("no price points supplied".to_string()));
    }
    if let Some(bad) = points.iter().find(|p| !p.adj_close.is_finite() || p.adj_close <= 0.0) {
        return Err(AppError::Validation(format!(
            "invalid adjusted close {} on {}", bad.adj_close, bad.td
        )));
    }
    sort_descending(points);
    if let Some(pair) = points.windows(2).find(|w| w[0].td == w[1].td) {
        return Err(AppError::Validation(format!("duplicate price for {}", pair[0].td)));
    }
    Ok(())
}

pub async fn import_prices(
    pool: &PgPool,
    symbol: &str,
    mut points: Vec<PricePoint>,
) -> Result<u64, AppError> {
    validate_import(&mut points)?;

    let affected = db::price_queries::upsert_many(pool, symbol, &points)
        .await
        .map_err(AppError::Db)?;
    info!("Imported {} prices for {}", affected, symbol);
    Ok(affected)
}

pub async fn get_technicals(
    pool: &PgPool,
    symbol: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<TechnicalRecord>, AppError> {
    if from > to {
        return Err(AppError::Validation(format!("from ({}) is after to ({})", from, to)));
    }
    let records = db::technical_queries::fetch_range(pool, symbol, from, to)
        .await
        .map_err(|e| {
            error!("Failed to fetch technical records for {}: {}", symbol, e);
            AppError::Db(e)
        })?;

    if records.is_empty() {
        return Err(AppError::NotFound(format!(
            "No technical records for {} between {} and {}", symbol, from, to
        )));
    }
    Ok(records)
}
