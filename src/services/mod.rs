pub mod indicators;
pub mod job_scheduler_service;
pub mod price_service;
pub mod price_window;
pub mod technical_batch_service;
pub mod technical_service;
pub mod trading_calendar;
pub mod worker_pool;
