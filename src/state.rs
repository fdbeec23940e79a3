use std::sync::Arc;
use sqlx::PgPool;
use crate::services::technical_batch_service::{TechnicalBatchService, TechnicalSink};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub batch_service: Arc<TechnicalBatchService>,
    pub sink: Arc<dyn TechnicalSink>,
}
