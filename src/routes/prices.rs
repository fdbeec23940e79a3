use axum::extract::{Path, State};
use axum::{Json, Router};
use axum::http::StatusCode;
use axum::routing::post;
use tracing::{info, error};

use crate::errors::AppError;
use crate::models::ImportPrices;
use crate::services;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:symbol", post(import_prices))
}

pub async fn import_prices(
    Path(symbol): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<ImportPrices>,
) -> Result<StatusCode, AppError> {
    let symbol = services::price_service::normalize_symbol(&symbol)?;
    info!("POST /prices/{} - Importing {} prices", symbol, body.points.len());
    services::price_service::import_prices(&state.pool, &symbol, body.points).await
        .map_err(|e| {
            error!("Failed to import prices for {}: {}", symbol, e);
            e
        })?;
    Ok(StatusCode::CREATED)
}
