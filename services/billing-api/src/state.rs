//! Application state for the Billing API service.

use splitfee_billing_core::{BillingOrchestrator, WebhookHandler};
use splitfee_db::DbPool;
use std::sync::Arc;

use crate::config::Config;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Billing façade (view, plan changes, snapshots, payouts)
    pub billing: Arc<BillingOrchestrator>,
    /// Stripe webhook verification
    pub webhooks: Arc<WebhookHandler>,
    /// Database pool (readiness checks)
    pub pool: DbPool,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state
    pub fn new(billing: BillingOrchestrator, pool: DbPool, config: Config) -> Self {
        let webhooks = WebhookHandler::new(config.billing.stripe_webhook_secret.clone())
            .with_tolerance(config.billing.webhook_tolerance);

        Self {
            billing: Arc::new(billing),
            webhooks: Arc::new(webhooks),
            pool,
            config: Arc::new(config),
        }
    }

    /// Get request timeout from config
    pub fn request_timeout(&self) -> std::time::Duration {
        self.config.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
