//! Payment provider abstraction

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use splitfee_types::{CustomerId, PlanId, PriceId, UserId};

use crate::{BillingError, CheckoutSession, Invoice};

/// Payment provider trait
///
/// Abstracts payment processing to allow different providers (Stripe, etc.)
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted checkout session for a paid plan
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, BillingError>;

    /// Change a processor subscription
    async fn update_subscription(
        &self,
        subscription_id: &str,
        patch: &SubscriptionPatch,
    ) -> Result<(), BillingError>;

    /// Recent invoices of a customer, newest first
    async fn list_invoices(
        &self,
        customer_id: &CustomerId,
        limit: u32,
    ) -> Result<Vec<Invoice>, BillingError>;
}

/// What a checkout session is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Paying user
    pub user_id: UserId,
    /// Catalog plan
    pub plan_id: PlanId,
    /// Processor price of the plan
    pub price_id: PriceId,
    /// Existing processor customer, if the user has one
    pub customer_id: Option<CustomerId>,
    /// Redirect after payment
    pub success_url: String,
    /// Redirect after abandoning
    pub cancel_url: String,
}

/// Fields to change on a processor subscription
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionPatch {
    /// Cancel when the current period ends
    pub cancel_at_period_end: Option<bool>,
    /// Cancel at an explicit time
    pub cancel_at: Option<DateTime<Utc>>,
}

impl SubscriptionPatch {
    /// Cancel at the end of the current period
    pub fn cancel_at_period_end() -> Self {
        Self {
            cancel_at_period_end: Some(true),
            ..Self::default()
        }
    }

    /// Cancel at `at`
    pub fn cancel_at(at: DateTime<Utc>) -> Self {
        Self {
            cancel_at: Some(at),
            ..Self::default()
        }
    }

    /// Whether the patch changes anything
    pub fn is_empty(&self) -> bool {
        self.cancel_at_period_end.is_none() && self.cancel_at.is_none()
    }
}
