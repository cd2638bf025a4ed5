//! Processor events, decoded from webhooks and applied to subscriptions

use chrono::{DateTime, Utc};

use splitfee_types::{CustomerId, PlanId, PriceId, SubscriptionStatus, UserId};

/// A payment processor notification in domain terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingEvent {
    /// Processor event ID, used as the idempotency token
    pub id: String,
    /// When the processor created the event
    pub occurred_at: DateTime<Utc>,
    /// What happened
    pub kind: BillingEventKind,
}

/// Event payloads the subscription state machine understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEventKind {
    /// A checkout the user started has been paid
    CheckoutCompleted {
        /// User who checked out
        user_id: UserId,
        /// Plan the checkout was for
        plan: PlanRef,
        /// Processor subscription created by the checkout
        stripe_subscription_id: Option<String>,
        /// Processor customer
        stripe_customer_id: Option<CustomerId>,
    },
    /// The processor reports a subscription's current state
    StatusChanged {
        /// Processor subscription
        stripe_subscription_id: String,
        /// Processor customer
        stripe_customer_id: Option<CustomerId>,
        /// Owning user, when the subscription carries it in metadata
        user_id: Option<UserId>,
        /// New status
        status: SubscriptionStatus,
        /// Plan the subscription is billed for, if reported
        plan: Option<PlanRef>,
        /// Current period start
        period_start: Option<DateTime<Utc>>,
        /// Current period end
        period_end: Option<DateTime<Utc>>,
        /// Scheduled cancellation
        cancel_at: Option<DateTime<Utc>>,
    },
}

/// How an event names its plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanRef {
    /// Catalog ID, from checkout metadata
    Id(PlanId),
    /// Processor price
    Price(PriceId),
}

impl std::fmt::Display for PlanRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "plan {id}"),
            Self::Price(price) => write!(f, "price {price}"),
        }
    }
}

/// Result of applying an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Subscription written
    Applied,
    /// Event recorded, subscription already matched it
    Unchanged,
    /// Event had been applied before
    Duplicate,
}

impl EventOutcome {
    /// Label for logs and metrics
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Unchanged => "unchanged",
            Self::Duplicate => "duplicate",
        }
    }
}
