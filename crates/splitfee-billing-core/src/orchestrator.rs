//! Billing orchestrator
//!
//! Façade over the catalog, subscriptions, commissions and payouts. Builds
//! the billing view and routes plan changes: free plans apply immediately,
//! paid plans hand back a checkout redirect and apply once the processor
//! confirms.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

use splitfee_types::{
    BillingStats, CheckoutSession, Invoice, Payout, Plan, PlanId, Subscription, UserId,
};

use crate::catalog::PlanCatalog;
use crate::commission::CommissionResolver;
use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::payout::{summarize, PayoutLedger};
use crate::provider::PaymentProvider;
use crate::stores::Stores;
use crate::subscription::{EffectiveSubscription, SubscriptionService};

/// Everything the billing page shows
#[derive(Debug, Clone, Serialize)]
pub struct BillingView {
    /// Current subscription (virtual when the user never subscribed)
    pub subscription: Subscription,
    /// Plan in effect
    pub current_plan: Plan,
    /// Plans on offer, in display order
    pub plans: Vec<Plan>,
    /// Payouts, newest first
    pub payouts: Vec<Payout>,
    /// Processor invoices
    pub invoices: Vec<Invoice>,
    /// Earnings summary
    pub stats: BillingStats,
    /// Sections that could not be loaded and are shown empty
    pub degraded: Vec<DegradedSection>,
}

/// Optional parts of the billing view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedSection {
    /// Payouts and the stats derived from them
    Payouts,
    /// Processor invoices
    Invoices,
}

/// Result of a plan change request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanChangeResult {
    /// Applied; the subscription as it now stands
    Confirmed(Subscription),
    /// Paid plan: send the user to checkout, nothing changed yet
    Redirect(CheckoutSession),
    /// Already on that plan
    Unchanged(Subscription),
}

/// Bounded polling for a confirmation that arrives out of band
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay before the first re-check
    pub base_delay: Duration,
    /// Cap on a single delay
    pub max_delay: Duration,
    /// Give up after this long
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            timeout: Duration::from_secs(60),
        }
    }
}

impl PollConfig {
    /// Set the first delay
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the delay cap
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the overall deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay before re-check number `attempt` (0-based): `base * 2^attempt`,
    /// capped at `max_delay`
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt);
        self.base_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }
}

/// Billing façade
#[derive(Clone)]
pub struct BillingOrchestrator {
    catalog: PlanCatalog,
    subscriptions: SubscriptionService,
    commissions: CommissionResolver,
    ledger: PayoutLedger,
    provider: Arc<dyn PaymentProvider>,
    config: BillingConfig,
}

impl BillingOrchestrator {
    /// Wire up all billing components over the given stores
    pub fn new(stores: Stores, provider: Arc<dyn PaymentProvider>, config: BillingConfig) -> Self {
        let catalog = PlanCatalog::new(stores.plans);
        let subscriptions = SubscriptionService::new(
            stores.subscriptions.clone(),
            catalog.clone(),
            provider.clone(),
            config.clone(),
        );
        let commissions = CommissionResolver::new(
            subscriptions.clone(),
            stores.subscriptions,
            stores.commissions,
        );
        let ledger = PayoutLedger::new(stores.payouts, config.currency.clone());

        Self {
            catalog,
            subscriptions,
            commissions,
            ledger,
            provider,
            config,
        }
    }

    /// Plan catalog
    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    /// Subscription state machine
    pub fn subscriptions(&self) -> &SubscriptionService {
        &self.subscriptions
    }

    /// Commission resolver
    pub fn commissions(&self) -> &CommissionResolver {
        &self.commissions
    }

    /// Payout ledger
    pub fn ledger(&self) -> &PayoutLedger {
        &self.ledger
    }

    /// Build the billing view.
    ///
    /// Subscription and catalog failures fail the view. Payouts and invoices
    /// degrade to empty sections.
    #[instrument(skip(self))]
    pub async fn get_billing_view(&self, user_id: &UserId) -> Result<BillingView, BillingError> {
        let effective = self.subscriptions.effective_subscription(user_id).await?;
        let plans = self.catalog.list_active_plans().await?;

        let mut degraded = Vec::new();

        let payouts = match self.ledger.list_for_user(user_id).await {
            Ok(payouts) => payouts,
            Err(e) => {
                warn!(error = %e, "Payouts unavailable, showing none");
                degraded.push(DegradedSection::Payouts);
                Vec::new()
            }
        };
        let stats = summarize(&payouts, Utc::now());

        let invoices = match &effective.subscription.stripe_customer_id {
            None => Vec::new(),
            Some(customer_id) => match self
                .provider
                .list_invoices(customer_id, self.config.invoice_limit)
                .await
            {
                Ok(invoices) => invoices,
                Err(e) => {
                    warn!(error = %e, "Invoices unavailable, showing none");
                    degraded.push(DegradedSection::Invoices);
                    Vec::new()
                }
            },
        };

        let EffectiveSubscription { subscription, plan } = effective;
        Ok(BillingView {
            subscription,
            current_plan: plan,
            plans,
            payouts,
            invoices,
            stats,
            degraded,
        })
    }

    /// Switch a user to another plan
    #[instrument(skip(self))]
    pub async fn change_plan(
        &self,
        user_id: &UserId,
        plan_id: PlanId,
    ) -> Result<PlanChangeResult, BillingError> {
        let plan = self.catalog.get_plan(plan_id).await?;
        if !plan.is_active {
            return Err(BillingError::InactivePlan(plan_id));
        }

        let effective = self.subscriptions.effective_subscription(user_id).await?;
        if effective.plan.id == plan.id {
            debug!("Already on the requested plan");
            return Ok(PlanChangeResult::Unchanged(effective.subscription));
        }

        if plan.is_paid() {
            let session = self
                .subscriptions
                .begin_checkout(user_id, plan_id, None, None)
                .await?;
            return Ok(PlanChangeResult::Redirect(session));
        }

        let subscription = self.subscriptions.select_free_plan(user_id, plan_id).await?;
        info!(plan_id = %plan_id, "Plan change confirmed");
        Ok(PlanChangeResult::Confirmed(subscription))
    }

    /// Wait until the processor has confirmed a checkout for `plan_id`
    #[instrument(skip(self, poll))]
    pub async fn await_plan(
        &self,
        user_id: &UserId,
        plan_id: PlanId,
        poll: &PollConfig,
    ) -> Result<EffectiveSubscription, BillingError> {
        let deadline = Instant::now() + poll.timeout;
        let mut attempt = 0;

        loop {
            let effective = self.subscriptions.effective_subscription(user_id).await?;
            if effective.plan.id == plan_id {
                return Ok(effective);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(attempts = attempt + 1, "Plan change not confirmed in time");
                return Err(BillingError::ConfirmationTimeout(poll.timeout));
            }

            let delay = poll.delay_for_attempt(attempt).min(deadline - now);
            debug!(attempt, ?delay, "Plan not confirmed yet");
            sleep(delay).await;
            attempt += 1;
        }
    }
}
