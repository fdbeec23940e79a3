use axum::extract::{Path, Query, State};
use axum::{Json, Router};
use axum::routing::{get, post};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, error};

use crate::errors::AppError;
use crate::models::{RefreshSummary, TechnicalRecord};
use crate::services;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:symbol", get(get_technicals))
        .route("/:symbol/refresh", post(refresh_technicals))
}

pub async fn get_technicals(
    Path(symbol): Path<String>,
    Query(range): Query<DateRange>,
    State(state): State<AppState>,
) -> Result<Json<Vec<TechnicalRecord>>, AppError> {
    let symbol = services::price_service::normalize_symbol(&symbol)?;
    info!("GET /technicals/{} - {} to {}", symbol, range.from, range.to);
    let records = services::price_service::get_technicals(&state.pool, &symbol, range.from, range.to).await?;
    Ok(Json(records))
}

pub async fn refresh_technicals(
    Path(symbol): Path<String>,
    Query(range): Query<DateRange>,
    State(state): State<AppState>,
) -> Result<Json<RefreshSummary>, AppError> {
    let symbol = services::price_service::normalize_symbol(&symbol)?;
    info!("POST /technicals/{}/refresh - {} to {}", symbol, range.from, range.to);

    let batch = state.batch_service.compute(range.from, range.to, &symbol).await
        .map_err(|e| {
            error!("Failed to compute technical values for {}: {}", symbol, e);
            e
        })?;

    let records_stored = state.sink.store(&batch.records).await?;

    Ok(Json(RefreshSummary {
        symbol,
        from: range.from,
        to: range.to,
        records_stored,
        failures: batch.failures,
    }))
}
