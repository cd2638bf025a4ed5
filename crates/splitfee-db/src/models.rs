//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive.
//! Enumerations are stored as their slugs and decoded by the services.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Plan row from the database
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PlanRow {
    pub id: Uuid,
    pub tier: String,
    pub name: String,
    pub monthly_price_cents: i64,
    pub features: serde_json::Value,
    pub stripe_product_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Subscription row from the database
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: String,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at: Option<DateTime<Utc>>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Commission snapshot row (one per placement and role)
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct CommissionSnapshotRow {
    pub placement_id: Uuid,
    pub role: String,
    pub user_id: Uuid,
    pub tier: String,
    pub rate_percent: i16,
    pub resolved_at: DateTime<Utc>,
}

/// Payout row from the database
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PayoutRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub placement_id: Option<Uuid>,
    pub role: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRow {
    /// Convert to domain UserId
    pub fn user_id(&self) -> splitfee_types::UserId {
        splitfee_types::UserId(self.user_id)
    }

    /// Concurrency guard capturing this row's current version
    pub fn guard(&self) -> SubscriptionGuard {
        SubscriptionGuard {
            user_id: self.user_id,
            subscription_id: Some(self.id),
            version: self.version,
        }
    }
}

impl PayoutRow {
    /// Convert to domain PayoutId
    pub fn payout_id(&self) -> splitfee_types::PayoutId {
        splitfee_types::PayoutId(self.id)
    }
}

/// The subscription state a write was computed against.
///
/// `subscription_id: None` means the user had no stored subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionGuard {
    pub user_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub version: i64,
}

impl SubscriptionGuard {
    /// Guard for a user without a stored subscription
    pub fn absent(user_id: Uuid) -> Self {
        Self {
            user_id,
            subscription_id: None,
            version: 0,
        }
    }

    /// Whether `current` (the user's newest row, if any) still matches
    pub fn matches(&self, current: Option<&SubscriptionRow>) -> bool {
        match current {
            Some(row) => self.subscription_id == Some(row.id) && self.version == row.version,
            None => self.subscription_id.is_none(),
        }
    }
}
