//! Subscription types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CustomerId, PlanId, UserId};

/// Unique subscription identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    /// Create a new random subscription ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The nil ID carried by virtual subscriptions
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subscription status, mirroring the payment processor's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Subscription is active
    Active,
    /// In trial period
    Trialing,
    /// Payment is past due
    PastDue,
    /// Subscription was canceled
    Canceled,
    /// Initial payment not yet completed
    Incomplete,
    /// Initial payment window lapsed
    IncompleteExpired,
    /// Retries exhausted without payment
    Unpaid,
}

impl SubscriptionStatus {
    /// Slug used in storage and on the wire
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Unpaid => "unpaid",
        }
    }

    /// Whether a subscription in this status carries its plan.
    ///
    /// A subscription has to be paid for once before it grants anything.
    /// After that, dunning states keep the nominal plan until the processor
    /// ends the subscription.
    pub const fn grants_plan(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing | Self::PastDue | Self::Unpaid)
    }

    /// Whether the processor subscription is over and will not come back
    pub const fn is_ended(&self) -> bool {
        matches!(self, Self::Canceled | Self::IncompleteExpired)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "trialing" => Ok(Self::Trialing),
            "past_due" => Ok(Self::PastDue),
            "canceled" => Ok(Self::Canceled),
            "incomplete" => Ok(Self::Incomplete),
            "incomplete_expired" => Ok(Self::IncompleteExpired),
            "unpaid" => Ok(Self::Unpaid),
            _ => Err(StatusParseError(s.to_string())),
        }
    }
}

/// Error parsing a status string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid status: {0}")]
pub struct StatusParseError(pub String);

/// A user's billing relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription ID (nil for virtual subscriptions)
    pub id: SubscriptionId,
    /// User who owns the subscription
    pub user_id: UserId,
    /// Referenced plan
    pub plan_id: PlanId,
    /// Lifecycle status
    pub status: SubscriptionStatus,
    /// Current billing period start
    pub current_period_start: Option<DateTime<Utc>>,
    /// Current billing period end
    pub current_period_end: Option<DateTime<Utc>>,
    /// Scheduled cancellation
    pub cancel_at: Option<DateTime<Utc>>,
    /// Stripe subscription ID (if checked out)
    pub stripe_subscription_id: Option<String>,
    /// Stripe customer ID (if checked out)
    pub stripe_customer_id: Option<CustomerId>,
    /// Creation time of the last applied processor event
    pub last_event_at: Option<DateTime<Utc>>,
    /// Row version, bumped on every write (0 for virtual subscriptions)
    pub version: i64,
    /// Whether this is the implicit free subscription of a user with no row
    pub is_virtual: bool,
    /// When the subscription was created
    pub created_at: DateTime<Utc>,
    /// When the subscription was last written
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// The implicit free subscription for a user with no stored row
    pub fn virtual_free(user_id: UserId, free_plan_id: PlanId, now: DateTime<Utc>) -> Self {
        Self {
            id: SubscriptionId::nil(),
            user_id,
            plan_id: free_plan_id,
            status: SubscriptionStatus::Active,
            current_period_start: None,
            current_period_end: None,
            cancel_at: None,
            stripe_subscription_id: None,
            stripe_customer_id: None,
            last_event_at: None,
            version: 0,
            is_virtual: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the subscription was created through the payment processor
    pub fn is_checked_out(&self) -> bool {
        self.stripe_subscription_id.is_some()
    }
}
