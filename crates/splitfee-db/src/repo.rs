//! Repository traits
//!
//! Define async repository interfaces for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::*;

/// Plan repository trait
///
/// The catalog is written by an administrative process; the engine only reads.
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// All plans, in storage order
    async fn list_all(&self) -> DbResult<Vec<PlanRow>>;

    /// Find a plan by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PlanRow>>;

    /// Find a plan by its Stripe price ID
    async fn find_by_stripe_price_id(&self, price_id: &str) -> DbResult<Option<PlanRow>>;
}

/// Subscription repository trait
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find a subscription by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<SubscriptionRow>>;

    /// Newest subscription for a user, whatever its status
    async fn find_current_by_user_id(&self, user_id: Uuid) -> DbResult<Option<SubscriptionRow>>;

    /// Find subscription by Stripe subscription ID
    async fn find_by_stripe_id(&self, stripe_id: &str) -> DbResult<Option<SubscriptionRow>>;

    /// Create a new subscription.
    ///
    /// Fails with `VersionConflict` unless `guard` still describes the user's
    /// newest row, and with `Duplicate` if `event_id` was already recorded.
    async fn create(&self, sub: CreateSubscription) -> DbResult<SubscriptionRow>;

    /// Overwrite a subscription's mutable fields.
    ///
    /// Compare-and-set on `expected_version`; fails with `VersionConflict` if
    /// the row moved on, and with `Duplicate` if `event_id` was already recorded.
    async fn update(&self, update: UpdateSubscription) -> DbResult<SubscriptionRow>;

    /// Whether a processor event was already applied
    async fn has_processed_event(&self, event_id: &str) -> DbResult<bool>;

    /// Record a processor event without touching any subscription
    async fn record_event(&self, event_id: &str) -> DbResult<()>;
}

/// Create subscription input
#[derive(Debug, Clone)]
pub struct CreateSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: String,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub guard: SubscriptionGuard,
    pub event_id: Option<String>,
}

/// Full overwrite of a subscription's mutable fields
#[derive(Debug, Clone)]
pub struct UpdateSubscription {
    pub id: Uuid,
    pub expected_version: i64,
    pub plan_id: Uuid,
    pub status: String,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at: Option<DateTime<Utc>>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub event_id: Option<String>,
}

impl UpdateSubscription {
    /// Start an update from the row's current values
    pub fn from_row(row: &SubscriptionRow) -> Self {
        Self {
            id: row.id,
            expected_version: row.version,
            plan_id: row.plan_id,
            status: row.status.clone(),
            current_period_start: row.current_period_start,
            current_period_end: row.current_period_end,
            cancel_at: row.cancel_at,
            stripe_subscription_id: row.stripe_subscription_id.clone(),
            stripe_customer_id: row.stripe_customer_id.clone(),
            last_event_at: row.last_event_at,
            event_id: None,
        }
    }

    /// Whether applying this update would leave the row's fields unchanged
    pub fn is_noop_for(&self, row: &SubscriptionRow) -> bool {
        self.plan_id == row.plan_id
            && self.status == row.status
            && self.current_period_start == row.current_period_start
            && self.current_period_end == row.current_period_end
            && self.cancel_at == row.cancel_at
            && self.stripe_subscription_id == row.stripe_subscription_id
            && self.stripe_customer_id == row.stripe_customer_id
    }
}

/// Commission snapshot repository trait
///
/// Snapshots are append-only: no update, no delete.
#[async_trait]
pub trait CommissionRepository: Send + Sync {
    /// Persist a snapshot.
    ///
    /// Every guard is re-checked against the participant's current
    /// subscription in the same transaction (`VersionConflict` on mismatch).
    /// A snapshot that already exists for the placement yields `Duplicate`.
    async fn create(&self, snapshot: CreateSnapshot) -> DbResult<Vec<CommissionSnapshotRow>>;

    /// Rows of a placement's snapshot, empty if none was taken
    async fn find_by_placement(&self, placement_id: Uuid) -> DbResult<Vec<CommissionSnapshotRow>>;
}

/// Create snapshot input
#[derive(Debug, Clone)]
pub struct CreateSnapshot {
    pub placement_id: Uuid,
    pub resolved_at: DateTime<Utc>,
    pub entries: Vec<CreateSnapshotEntry>,
    pub guards: Vec<SubscriptionGuard>,
}

/// One role of a snapshot
#[derive(Debug, Clone)]
pub struct CreateSnapshotEntry {
    pub role: String,
    pub user_id: Uuid,
    pub tier: String,
    pub rate_percent: i16,
}

/// Payout repository trait
#[async_trait]
pub trait PayoutRepository: Send + Sync {
    /// Find a payout by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PayoutRow>>;

    /// All payouts for a user, newest first
    async fn find_by_user_id(&self, user_id: Uuid) -> DbResult<Vec<PayoutRow>>;

    /// Create a payout; `Duplicate` if the (placement, role) pair exists
    async fn create(&self, payout: CreatePayout) -> DbResult<PayoutRow>;

    /// Move a payout from `from` to `to`.
    ///
    /// Fails with `VersionConflict` if the stored status is no longer `from`,
    /// and with `NotFound` if the payout does not exist.
    async fn update_status(
        &self,
        id: Uuid,
        from: &str,
        to: &str,
        completed_at: Option<DateTime<Utc>>,
    ) -> DbResult<PayoutRow>;
}

/// Create payout input
#[derive(Debug, Clone)]
pub struct CreatePayout {
    pub id: Uuid,
    pub user_id: Uuid,
    pub placement_id: Option<Uuid>,
    pub role: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub scheduled_for: Option<DateTime<Utc>>,
}
