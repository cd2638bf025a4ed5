//! Billing configuration

use std::time::Duration;

/// Stripe REST API base
pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Billing service configuration
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe webhook secret
    pub stripe_webhook_secret: String,
    /// Stripe API base URL (overridden in tests)
    pub stripe_api_base: String,
    /// Default success URL for checkout
    pub default_success_url: String,
    /// Default cancel URL for checkout
    pub default_cancel_url: String,
    /// Payout currency
    pub currency: String,
    /// Upper bound on a checkout handle request
    pub checkout_timeout: Duration,
    /// Accepted clock skew on webhook signatures
    pub webhook_tolerance: Duration,
    /// Invoices fetched for the billing view
    pub invoice_limit: u32,
}

impl BillingConfig {
    /// Create a new billing config
    pub fn new(
        stripe_secret_key: impl Into<String>,
        stripe_webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            stripe_secret_key: stripe_secret_key.into(),
            stripe_webhook_secret: stripe_webhook_secret.into(),
            stripe_api_base: STRIPE_API_BASE.to_string(),
            default_success_url: "https://app.splitfee.io/billing/success".to_string(),
            default_cancel_url: "https://app.splitfee.io/billing/cancel".to_string(),
            currency: "usd".to_string(),
            checkout_timeout: Duration::from_secs(10),
            webhook_tolerance: Duration::from_secs(300),
            invoice_limit: 12,
        }
    }

    /// Set default URLs
    #[must_use]
    pub fn with_urls(
        mut self,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        self.default_success_url = success_url.into();
        self.default_cancel_url = cancel_url.into();
        self
    }

    /// Point the provider at another API base
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.stripe_api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the payout currency
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into().to_lowercase();
        self
    }

    /// Set the checkout request timeout
    #[must_use]
    pub fn with_checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout = timeout;
        self
    }

    /// Set the webhook timestamp tolerance
    #[must_use]
    pub fn with_webhook_tolerance(mut self, tolerance: Duration) -> Self {
        self.webhook_tolerance = tolerance;
        self
    }

    /// Set how many invoices the billing view fetches
    #[must_use]
    pub fn with_invoice_limit(mut self, limit: u32) -> Self {
        self.invoice_limit = limit;
        self
    }
}
