use axum::Router;
use tower_http::cors::CorsLayer;

use crate::routes::{health, prices, technicals};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/prices", prices::router())
        .nest("/api/technicals", technicals::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
