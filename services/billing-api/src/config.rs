//! Configuration for the Billing API service.

use splitfee_billing_core::BillingConfig;
use std::time::Duration;

/// Billing API configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// Database URL
    pub database_url: String,
    /// Run pending migrations at startup
    pub run_migrations: bool,
    /// Billing core configuration
    pub billing: BillingConfig,
    /// Request timeout
    pub request_timeout: Duration,
    /// Metrics enabled
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Database
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let run_migrations = flag("RUN_MIGRATIONS", false);

        let http_port = std::env::var("HTTP_PORT")
            .unwrap_or_else(|_| "8081".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("HTTP_PORT"))?;

        // Stripe configuration
        let stripe_secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| ConfigError::Missing("STRIPE_SECRET_KEY"))?;

        let stripe_webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| ConfigError::Missing("STRIPE_WEBHOOK_SECRET"))?;

        // Default URLs for checkout
        let default_success_url = std::env::var("BILLING_SUCCESS_URL")
            .unwrap_or_else(|_| "https://app.splitfee.io/billing/success".to_string());

        let default_cancel_url = std::env::var("BILLING_CANCEL_URL")
            .unwrap_or_else(|_| "https://app.splitfee.io/billing/cancel".to_string());

        let currency = std::env::var("PAYOUT_CURRENCY").unwrap_or_else(|_| "usd".to_string());

        let checkout_timeout_secs = secs("CHECKOUT_TIMEOUT_SECS", 10)?;
        let request_timeout_secs = secs("REQUEST_TIMEOUT_SECS", 30)?;

        let metrics_enabled = flag("METRICS_ENABLED", true);

        let mut billing = BillingConfig::new(stripe_secret_key, stripe_webhook_secret)
            .with_urls(default_success_url, default_cancel_url)
            .with_currency(currency)
            .with_checkout_timeout(Duration::from_secs(checkout_timeout_secs));

        if let Ok(api_base) = std::env::var("STRIPE_API_BASE") {
            billing = billing.with_api_base(api_base);
        }

        Ok(Self {
            http_port,
            database_url,
            run_migrations,
            billing,
            request_timeout: Duration::from_secs(request_timeout_secs),
            metrics_enabled,
        })
    }
}

fn secs(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid(var)),
        Err(_) => Ok(default),
    }
}

fn flag(var: &str, default: bool) -> bool {
    std::env::var(var)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
