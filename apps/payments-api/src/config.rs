//! Payments API configuration module.
//!
//! Configuration is loaded from environment variables (after an optional
//! `.env` file) with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Payments API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// HTTP server port
    pub http_port: u16,

    /// SQLite database file
    pub database_path: String,

    /// Payrexx API base domain, shared by all schools
    pub payrexx_api_domain: String,

    /// Upper bound for every gateway call, in milliseconds
    pub gateway_timeout_ms: u64,

    /// Back-office panel base URL (payment redirects)
    pub panel_url: Option<String>,

    /// Mobile app base URL (payment redirects)
    pub app_url: Option<String>,

    /// Notification outbox poll interval in seconds
    pub outbox_poll_interval_secs: u64,

    /// Notifications sent per poll
    pub outbox_batch_size: u32,

    /// Sender address for confirmation mails
    pub mail_from: String,
}

impl ApiConfig {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env file is normal outside development
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = ApiConfig {
            http_port: var("HTTP_PORT", "8080")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("HTTP_PORT".to_string()))?,

            database_path: var("DATABASE_PATH", "./boukii-payments.db"),

            payrexx_api_domain: var("PAYREXX_API_DOMAIN", "payrexx.com").trim().to_string(),

            gateway_timeout_ms: var("GATEWAY_TIMEOUT_MS", "5000")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("GATEWAY_TIMEOUT_MS".to_string()))?,

            panel_url: lookup("PANEL_URL").filter(|v| !v.trim().is_empty()),

            app_url: lookup("APP_URL").filter(|v| !v.trim().is_empty()),

            outbox_poll_interval_secs: var("OUTBOX_POLL_INTERVAL_SECS", "5")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("OUTBOX_POLL_INTERVAL_SECS".to_string()))?,

            outbox_batch_size: var("OUTBOX_BATCH_SIZE", "50")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("OUTBOX_BATCH_SIZE".to_string()))?,

            mail_from: var("MAIL_FROM", "no-reply@boukii.com"),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.payrexx_api_domain.is_empty() {
            return Err(ConfigError::MissingRequired("PAYREXX_API_DOMAIN".to_string()));
        }
        if self.gateway_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("GATEWAY_TIMEOUT_MS".to_string()));
        }
        if self.outbox_poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("OUTBOX_POLL_INTERVAL_SECS".to_string()));
        }

        for (key, value) in [("PANEL_URL", &self.panel_url), ("APP_URL", &self.app_url)] {
            if let Some(value) = value {
                let valid = url::Url::parse(value)
                    .map(|u| matches!(u.scheme(), "http" | "https"))
                    .unwrap_or(false);
                if !valid {
                    return Err(ConfigError::InvalidValue(key.to_string()));
                }
            }
        }

        Ok(())
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }

    pub fn outbox_poll_interval(&self) -> Duration {
        Duration::from_secs(self.outbox_poll_interval_secs)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
