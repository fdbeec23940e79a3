use anyhow::{Context, Result};

/// Runtime settings for the service, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub server_port: u16,
    pub db_max_connections: u32,
    pub technical_workers: usize,
    /// How many trailing trading days the scheduled job recomputes per symbol.
    pub technical_update_days: i64,
    pub run_scheduler: bool,
    pub scheduler_test_mode: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let config = Self {
            database_url,
            server_port: parse_var("SERVER_PORT", 3000)?,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 10)?,
            technical_workers: parse_var("TECHNICAL_WORKERS", num_cpus::get())?,
            technical_update_days: parse_var("TECHNICAL_UPDATE_DAYS", 5)?,
            run_scheduler: parse_var("RUN_SCHEDULER", true)?,
            scheduler_test_mode: parse_var("JOB_SCHEDULER_TEST_MODE", false)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.technical_workers == 0 {
            anyhow::bail!("TECHNICAL_WORKERS must be at least 1");
        }
        if self.technical_update_days < 1 {
            anyhow::bail!("TECHNICAL_UPDATE_DAYS must be at least 1");
        }
        Ok(())
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}
