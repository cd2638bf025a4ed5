//! Mock repositories for testing
//!
//! In-memory stand-ins that keep the guarantees of the PostgreSQL stores:
//! version compare-and-set, idempotency tokens recorded with the write,
//! guard re-checks on snapshot insert and unique (placement, role) payouts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde_json::json;
use splitfee_db::{
    CommissionRepository, CommissionSnapshotRow, CreatePayout, CreateSnapshot,
    CreateSubscription, DbError, DbResult, PayoutRepository, PayoutRow, PlanRepository, PlanRow,
    SubscriptionRepository, SubscriptionRow, UpdateSubscription,
};
use uuid::Uuid;

/// In-memory plan repository for testing
#[derive(Default, Clone)]
pub struct MockPlanRepository {
    plans: Arc<DashMap<Uuid, PlanRow>>,
}

impl MockPlanRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a plan row directly
    pub fn insert_plan(&self, plan: PlanRow) {
        self.plans.insert(plan.id, plan);
    }

    /// Flip a plan's active flag
    #[allow(dead_code)]
    pub fn set_active(&self, id: Uuid, active: bool) {
        if let Some(mut plan) = self.plans.get_mut(&id) {
            plan.is_active = active;
        }
    }

    /// Build a plan row with sensible features
    pub fn plan_row(tier: &str, monthly_price_cents: i64) -> PlanRow {
        let price_id = (monthly_price_cents > 0).then(|| format!("price_{tier}"));
        PlanRow {
            id: Uuid::new_v4(),
            tier: tier.to_string(),
            name: format!("{} plan", tier.to_uppercase()),
            monthly_price_cents,
            features: json!({
                "version": 1,
                "applications_per_month": if monthly_price_cents > 0 { -1 } else { 10 },
                "candidate_database": monthly_price_cents > 0,
            }),
            stripe_product_id: price_id.as_ref().map(|_| format!("prod_{tier}")),
            stripe_price_id: price_id,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl PlanRepository for MockPlanRepository {
    async fn list_all(&self) -> DbResult<Vec<PlanRow>> {
        Ok(self.plans.iter().map(|r| r.value().clone()).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PlanRow>> {
        Ok(self.plans.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_stripe_price_id(&self, price_id: &str) -> DbResult<Option<PlanRow>> {
        Ok(self
            .plans
            .iter()
            .find(|r| r.stripe_price_id.as_deref() == Some(price_id))
            .map(|r| r.value().clone()))
    }
}

/// In-memory subscription repository for testing
#[derive(Default, Clone)]
pub struct MockSubscriptionRepository {
    subscriptions: Arc<DashMap<Uuid, SubscriptionRow>>,
    events: Arc<DashMap<String, DateTime<Utc>>>,
    // Stands in for the per-user advisory lock
    write_lock: Arc<Mutex<()>>,
    last_created: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl MockSubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest row of a user
    pub fn current(&self, user_id: Uuid) -> Option<SubscriptionRow> {
        self.subscriptions
            .iter()
            .filter(|r| r.user_id == user_id)
            .max_by_key(|r| r.created_at)
            .map(|r| r.value().clone())
    }

    /// All rows of a user, oldest first
    #[allow(dead_code)]
    pub fn history(&self, user_id: Uuid) -> Vec<SubscriptionRow> {
        let mut rows: Vec<SubscriptionRow> = self
            .subscriptions
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|r| r.created_at);
        rows
    }

    /// Number of recorded idempotency tokens
    #[allow(dead_code)]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    fn next_created_at(&self) -> DateTime<Utc> {
        let mut last = self.last_created.lock().unwrap();
        let now = Utc::now();
        let created = match *last {
            Some(prev) if prev >= now => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(created);
        created
    }

    fn insert_event(&self, event_id: &str) -> DbResult<()> {
        if self.events.contains_key(event_id) {
            return Err(DbError::Duplicate(format!("event {event_id}")));
        }
        self.events.insert(event_id.to_string(), Utc::now());
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepository for MockSubscriptionRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<SubscriptionRow>> {
        Ok(self.subscriptions.get(&id).map(|r| r.value().clone()))
    }

    async fn find_current_by_user_id(&self, user_id: Uuid) -> DbResult<Option<SubscriptionRow>> {
        Ok(self.current(user_id))
    }

    async fn find_by_stripe_id(&self, stripe_id: &str) -> DbResult<Option<SubscriptionRow>> {
        Ok(self
            .subscriptions
            .iter()
            .find(|r| r.stripe_subscription_id.as_deref() == Some(stripe_id))
            .map(|r| r.value().clone()))
    }

    async fn create(&self, sub: CreateSubscription) -> DbResult<SubscriptionRow> {
        let _guard = self.write_lock.lock().unwrap();

        if !sub.guard.matches(self.current(sub.user_id).as_ref()) {
            return Err(DbError::VersionConflict(format!(
                "subscription of user {} changed",
                sub.user_id
            )));
        }
        if let Some(stripe_id) = sub.stripe_subscription_id.as_deref() {
            let taken = self
                .subscriptions
                .iter()
                .any(|r| r.stripe_subscription_id.as_deref() == Some(stripe_id));
            if taken {
                return Err(DbError::Duplicate(
                    "subscriptions_stripe_subscription_id_key".to_string(),
                ));
            }
        }
        if let Some(event_id) = sub.event_id.as_deref() {
            self.insert_event(event_id)?;
        }

        let created_at = self.next_created_at();
        let row = SubscriptionRow {
            id: sub.id,
            user_id: sub.user_id,
            plan_id: sub.plan_id,
            status: sub.status,
            current_period_start: sub.current_period_start,
            current_period_end: sub.current_period_end,
            cancel_at: None,
            stripe_subscription_id: sub.stripe_subscription_id,
            stripe_customer_id: sub.stripe_customer_id,
            last_event_at: sub.last_event_at,
            version: 1,
            created_at,
            updated_at: created_at,
        };
        self.subscriptions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update(&self, update: UpdateSubscription) -> DbResult<SubscriptionRow> {
        let _guard = self.write_lock.lock().unwrap();

        let mut row = self
            .subscriptions
            .get_mut(&update.id)
            .ok_or(DbError::NotFound)?;

        if row.version != update.expected_version {
            return Err(DbError::VersionConflict(format!(
                "subscription {} is no longer at version {}",
                update.id, update.expected_version
            )));
        }
        if let Some(event_id) = update.event_id.as_deref() {
            self.insert_event(event_id)?;
        }

        row.plan_id = update.plan_id;
        row.status = update.status;
        row.current_period_start = update.current_period_start;
        row.current_period_end = update.current_period_end;
        row.cancel_at = update.cancel_at;
        row.stripe_subscription_id = update.stripe_subscription_id;
        row.stripe_customer_id = update.stripe_customer_id;
        row.last_event_at = update.last_event_at;
        row.version += 1;
        row.updated_at = Utc::now();

        Ok(row.clone())
    }

    async fn has_processed_event(&self, event_id: &str) -> DbResult<bool> {
        Ok(self.events.contains_key(event_id))
    }

    async fn record_event(&self, event_id: &str) -> DbResult<()> {
        let _guard = self.write_lock.lock().unwrap();
        self.insert_event(event_id)
    }
}

/// In-memory commission snapshot repository for testing
#[derive(Clone)]
pub struct MockCommissionRepository {
    snapshots: Arc<DashMap<Uuid, Vec<CommissionSnapshotRow>>>,
    subscriptions: MockSubscriptionRepository,
}

impl MockCommissionRepository {
    /// Snapshots re-check guards against this subscription store
    pub fn new(subscriptions: MockSubscriptionRepository) -> Self {
        Self {
            snapshots: Arc::new(DashMap::new()),
            subscriptions,
        }
    }
}

#[async_trait]
impl CommissionRepository for MockCommissionRepository {
    async fn create(&self, snapshot: CreateSnapshot) -> DbResult<Vec<CommissionSnapshotRow>> {
        let _guard = self.subscriptions.write_lock.lock().unwrap();

        if self.snapshots.contains_key(&snapshot.placement_id) {
            return Err(DbError::Duplicate("commission_snapshots_pkey".to_string()));
        }
        for guard in &snapshot.guards {
            if !guard.matches(self.subscriptions.current(guard.user_id).as_ref()) {
                return Err(DbError::VersionConflict(format!(
                    "subscription of user {} changed during resolution",
                    guard.user_id
                )));
            }
        }

        let rows: Vec<CommissionSnapshotRow> = snapshot
            .entries
            .into_iter()
            .map(|entry| CommissionSnapshotRow {
                placement_id: snapshot.placement_id,
                role: entry.role,
                user_id: entry.user_id,
                tier: entry.tier,
                rate_percent: entry.rate_percent,
                resolved_at: snapshot.resolved_at,
            })
            .collect();
        self.snapshots.insert(snapshot.placement_id, rows.clone());
        Ok(rows)
    }

    async fn find_by_placement(&self, placement_id: Uuid) -> DbResult<Vec<CommissionSnapshotRow>> {
        Ok(self
            .snapshots
            .get(&placement_id)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }
}

/// In-memory payout repository for testing
#[derive(Default, Clone)]
pub struct MockPayoutRepository {
    payouts: Arc<DashMap<Uuid, PayoutRow>>,
    unavailable: Arc<AtomicBool>,
}

impl MockPayoutRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the database were down
    #[allow(dead_code)]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Insert a payout row directly
    #[allow(dead_code)]
    pub fn insert_payout(&self, row: PayoutRow) {
        self.payouts.insert(row.id, row);
    }

    /// Build a payout row
    #[allow(dead_code)]
    pub fn payout_row(
        user_id: Uuid,
        status: &str,
        amount_cents: i64,
        created_at: DateTime<Utc>,
    ) -> PayoutRow {
        PayoutRow {
            id: Uuid::new_v4(),
            user_id,
            placement_id: Some(Uuid::new_v4()),
            role: Some("candidate_recruiter".to_string()),
            amount_cents,
            currency: "usd".to_string(),
            status: status.to_string(),
            scheduled_for: None,
            completed_at: (status == "completed").then_some(created_at),
            created_at,
            updated_at: created_at,
        }
    }

    fn check_available(&self) -> DbResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl PayoutRepository for MockPayoutRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PayoutRow>> {
        self.check_available()?;
        Ok(self.payouts.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> DbResult<Vec<PayoutRow>> {
        self.check_available()?;
        let mut rows: Vec<PayoutRow> = self
            .payouts
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn create(&self, payout: CreatePayout) -> DbResult<PayoutRow> {
        self.check_available()?;
        if payout.placement_id.is_some() {
            let exists = self
                .payouts
                .iter()
                .any(|r| r.placement_id == payout.placement_id && r.role == payout.role);
            if exists {
                return Err(DbError::Duplicate("payouts_placement_role_key".to_string()));
            }
        }

        let now = Utc::now();
        let row = PayoutRow {
            id: payout.id,
            user_id: payout.user_id,
            placement_id: payout.placement_id,
            role: payout.role,
            amount_cents: payout.amount_cents,
            currency: payout.currency,
            status: "pending".to_string(),
            scheduled_for: payout.scheduled_for,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.payouts.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: &str,
        to: &str,
        completed_at: Option<DateTime<Utc>>,
    ) -> DbResult<PayoutRow> {
        self.check_available()?;
        let mut row = self.payouts.get_mut(&id).ok_or(DbError::NotFound)?;
        if row.status != from {
            return Err(DbError::VersionConflict(format!(
                "payout {id} is no longer {from}"
            )));
        }
        row.status = to.to_string();
        if completed_at.is_some() {
            row.completed_at = completed_at;
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }
}
