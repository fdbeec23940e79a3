//! Background Jobs Module
//!
//! Jobs registered with the job scheduler service. Each job is idempotent:
//! records are upserted by (symbol, trading date), so a re-run overwrites the
//! previous values.
//!
//! # Available Jobs
//!
//! - `technical_update_job` - Recomputes technical values for recent trading days

pub mod technical_update_job;
