use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use stock_technical::app;
use stock_technical::config::AppConfig;
use stock_technical::logging::{init_logging, LoggingConfig};
use stock_technical::services::job_scheduler_service::{JobContext, JobSchedulerService};
use stock_technical::services::price_window::PgPriceStore;
use stock_technical::services::technical_batch_service::{PgTechnicalSink, TechnicalBatchService};
use stock_technical::services::trading_calendar::NyseCalendar;
use stock_technical::services::worker_pool::ParallelPool;
use stock_technical::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env())
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    let workers = ParallelPool::new(config.technical_workers)
        .context("failed to build technical worker pool")?;
    tracing::info!("🔧 Technical worker pool: {} threads", config.technical_workers);

    let batch_service = Arc::new(TechnicalBatchService::new(
        Arc::new(PgPriceStore::new(pool.clone())),
        Arc::new(NyseCalendar::new()),
        Arc::new(workers),
    ));
    let sink = Arc::new(PgTechnicalSink::new(pool.clone()));

    let mut scheduler = if config.run_scheduler {
        let context = JobContext {
            pool: Arc::new(pool.clone()),
            batch_service: batch_service.clone(),
            sink: sink.clone(),
            update_days: config.technical_update_days,
        };
        let mut scheduler = JobSchedulerService::new(context, config.scheduler_test_mode).await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        tracing::info!("Job scheduler disabled (RUN_SCHEDULER=false)");
        None
    };

    let state = AppState {
        pool,
        batch_service,
        sink,
    };
    let app = app::create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("🚀 stock-technical running at http://{}/", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.stop().await?;
    }

    Ok(())
}
