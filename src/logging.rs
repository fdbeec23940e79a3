//! Tracing setup: console output always, Loki shipping when enabled.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub loki_enabled: bool,
    pub loki_url: Option<String>,
    pub service_name: String,
    pub environment: String,
    pub log_level: String,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        let var_or = |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.to_string());
        Self {
            loki_enabled: var_or("LOKI_ENABLED", "false").trim().eq_ignore_ascii_case("true"),
            loki_url: std::env::var("LOKI_URL").ok().filter(|url| !url.trim().is_empty()),
            service_name: var_or("SERVICE_NAME", "stock-technical"),
            environment: var_or("ENVIRONMENT", "development"),
            log_level: var_or("RUST_LOG", "info"),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.loki_enabled && self.loki_url.is_none() {
            return Err("LOKI_ENABLED is true but LOKI_URL is not set".to_string());
        }
        Ok(())
    }

    /// Loki endpoint to ship to, if shipping is switched on.
    fn loki_target(&self) -> Option<&str> {
        if self.loki_enabled {
            self.loki_url.as_deref()
        } else {
            None
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    #[cfg(feature = "loki")]
    {
        let loki = match config.loki_target() {
            Some(target) => Some(loki_layer(&config, target)?),
            None => None,
        };
        tracing_subscriber::registry()
            .with(config.filter())
            .with(tracing_subscriber::fmt::layer())
            .with(loki)
            .init();
    }

    #[cfg(not(feature = "loki"))]
    {
        tracing_subscriber::registry()
            .with(config.filter())
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    match config.loki_target() {
        Some(target) if cfg!(feature = "loki") => {
            tracing::info!("✅ {} ({}) logging to console and Loki at {}", config.service_name, config.environment, target)
        }
        _ => tracing::info!("📊 {} ({}) logging to console", config.service_name, config.environment),
    }
    Ok(())
}

/// Builds the Loki layer and spawns its background shipper onto the current
/// tokio runtime.
#[cfg(feature = "loki")]
fn loki_layer(config: &LoggingConfig, target: &str) -> Result<tracing_loki::Layer, Box<dyn std::error::Error>> {
    let (layer, shipper) = tracing_loki::builder()
        .label("service", &config.service_name)?
        .label("environment", &config.environment)?
        .build_url(url::Url::parse(target)?)?;
    tokio::spawn(shipper);
    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(loki_enabled: bool, loki_url: Option<&str>) -> LoggingConfig {
        LoggingConfig {
            loki_enabled,
            loki_url: loki_url.map(str::to_string),
            service_name: "stock-technical".to_string(),
            environment: "test".to_string(),
            log_level: "debug".to_string(),
        }
    }

    #[test]
    fn test_loki_requires_url() {
        assert!(config(true, None).validate().is_err());
        assert!(config(true, Some("http://localhost:3100")).validate().is_ok());
        assert!(config(false, None).validate().is_ok());
    }

    #[test]
    fn test_loki_target_only_when_enabled() {
        assert_eq!(config(true, Some("http://loki:3100")).loki_target(), Some("http://loki:3100"));
        assert_eq!(config(false, Some("http://loki:3100")).loki_target(), None);
    }
}
