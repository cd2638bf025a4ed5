//! Subscription state machine
//!
//! A user's billing state is their newest subscription row. Users without a
//! row are on a virtual free subscription that is never stored. Rows move by
//! explicit plan selection (free plans), by processor events (paid plans),
//! and by scheduled cancellation.
//!
//! Every write is compare-and-set on the row version. Processor events carry
//! an idempotency token recorded in the same transaction as the write, and
//! events older than the last applied one are dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use splitfee_db::{
    CreateSubscription, DbError, SubscriptionGuard, SubscriptionRepository, SubscriptionRow,
    UpdateSubscription,
};
use splitfee_types::{
    CheckoutSession, CustomerId, Plan, PlanId, Subscription, SubscriptionId, SubscriptionStatus,
    Tier, UserId,
};

use crate::catalog::PlanCatalog;
use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::events::{BillingEvent, BillingEventKind, EventOutcome, PlanRef};
use crate::provider::{CheckoutRequest, PaymentProvider, SubscriptionPatch};

/// A user's subscription together with the plan it currently grants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveSubscription {
    /// Stored or virtual subscription
    pub subscription: Subscription,
    /// The plan in effect: the referenced plan, or the free plan once the
    /// subscription has ended
    pub plan: Plan,
}

impl EffectiveSubscription {
    /// Commission tier of the plan in effect
    pub fn tier(&self) -> Result<Tier, BillingError> {
        Ok(self.plan.tier.tier()?)
    }

    /// Guard that a later write can check this state against
    pub fn guard(&self) -> SubscriptionGuard {
        if self.subscription.is_virtual {
            SubscriptionGuard::absent(self.subscription.user_id.0)
        } else {
            SubscriptionGuard {
                user_id: self.subscription.user_id.0,
                subscription_id: Some(self.subscription.id.0),
                version: self.subscription.version,
            }
        }
    }
}

/// Subscription lifecycle operations
#[derive(Clone)]
pub struct SubscriptionService {
    subscriptions: Arc<dyn SubscriptionRepository>,
    catalog: PlanCatalog,
    provider: Arc<dyn PaymentProvider>,
    config: BillingConfig,
}

impl SubscriptionService {
    /// Create a new subscription service
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        catalog: PlanCatalog,
        provider: Arc<dyn PaymentProvider>,
        config: BillingConfig,
    ) -> Self {
        Self {
            subscriptions,
            catalog,
            provider,
            config,
        }
    }

    /// The subscription and plan in effect for a user
    #[instrument(skip(self))]
    pub async fn effective_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<EffectiveSubscription, BillingError> {
        let row = self.subscriptions.find_current_by_user_id(user_id.0).await?;

        let Some(row) = row else {
            let free = self.catalog.free_plan().await?;
            return Ok(EffectiveSubscription {
                subscription: Subscription::virtual_free(*user_id, free.id, Utc::now()),
                plan: free,
            });
        };

        let subscription = decode_subscription(row)?;
        let plan = if subscription.status.grants_plan() {
            self.catalog.get_plan(subscription.plan_id).await?
        } else {
            self.catalog.free_plan().await?
        };

        Ok(EffectiveSubscription { subscription, plan })
    }

    /// Move a user onto a free plan.
    ///
    /// Takes effect immediately, except while a paid processor subscription
    /// is still running: that one is set to cancel at period end and the
    /// user falls back to free once the processor reports it ended.
    #[instrument(skip(self))]
    pub async fn select_free_plan(
        &self,
        user_id: &UserId,
        plan_id: PlanId,
    ) -> Result<Subscription, BillingError> {
        let plan = self.catalog.get_plan(plan_id).await?;
        if !plan.is_active {
            return Err(BillingError::InactivePlan(plan_id));
        }
        if plan.is_paid() {
            return Err(BillingError::CheckoutRequired(plan_id));
        }

        let current = self.subscriptions.find_current_by_user_id(user_id.0).await?;

        let Some(row) = current else {
            return self
                .create_free_row(user_id, &plan, SubscriptionGuard::absent(user_id.0), None)
                .await;
        };

        let status = parse_status(&row)?;
        if status.is_ended() {
            // The ended processor subscription stays on its own row
            return self
                .create_free_row(user_id, &plan, row.guard(), row.stripe_customer_id.clone())
                .await;
        }
        if row.stripe_subscription_id.is_some() {
            info!(subscription_id = %row.id, "Downgrade scheduled at period end");
            return self.cancel_row(row, None).await;
        }

        let mut update = UpdateSubscription::from_row(&row);
        update.plan_id = plan.id.0;
        update.status = SubscriptionStatus::Active.as_str().to_string();
        update.cancel_at = None;

        if update.is_noop_for(&row) {
            return decode_subscription(row);
        }

        let row = self.subscriptions.update(update).await.map_err(conflict)?;
        info!(subscription_id = %row.id, plan_id = %plan_id, "Free plan selected");
        decode_subscription(row)
    }

    async fn create_free_row(
        &self,
        user_id: &UserId,
        plan: &Plan,
        guard: SubscriptionGuard,
        stripe_customer_id: Option<String>,
    ) -> Result<Subscription, BillingError> {
        let row = self
            .subscriptions
            .create(CreateSubscription {
                id: Uuid::new_v4(),
                user_id: user_id.0,
                plan_id: plan.id.0,
                status: SubscriptionStatus::Active.as_str().to_string(),
                current_period_start: None,
                current_period_end: None,
                stripe_subscription_id: None,
                stripe_customer_id,
                last_event_at: None,
                guard,
                event_id: None,
            })
            .await
            .map_err(conflict)?;

        info!(subscription_id = %row.id, plan_id = %plan.id, "Free subscription created");
        decode_subscription(row)
    }

    /// Ask the processor for a checkout handle for a paid plan.
    ///
    /// Nothing is written; the plan only changes once the processor confirms
    /// the checkout through [`apply_event`](Self::apply_event).
    #[instrument(skip(self))]
    pub async fn begin_checkout(
        &self,
        user_id: &UserId,
        plan_id: PlanId,
        success_url: Option<String>,
        cancel_url: Option<String>,
    ) -> Result<CheckoutSession, BillingError> {
        let plan = self.catalog.get_plan(plan_id).await?;
        if !plan.is_active {
            return Err(BillingError::InactivePlan(plan_id));
        }
        let price_id = plan
            .stripe_price_id
            .clone()
            .filter(|_| plan.is_paid())
            .ok_or_else(|| BillingError::MalformedPlan {
                plan: plan_id.to_string(),
                reason: "plan has no checkout price".to_string(),
            })?;

        let customer_id = self
            .subscriptions
            .find_current_by_user_id(user_id.0)
            .await?
            .and_then(|row| row.stripe_customer_id)
            .map(CustomerId);

        let request = CheckoutRequest {
            user_id: *user_id,
            plan_id,
            price_id,
            customer_id,
            success_url: success_url.unwrap_or_else(|| self.config.default_success_url.clone()),
            cancel_url: cancel_url.unwrap_or_else(|| self.config.default_cancel_url.clone()),
        };

        let timeout = self.config.checkout_timeout;
        match tokio::time::timeout(timeout, self.provider.create_checkout_session(&request)).await
        {
            Ok(Ok(session)) => {
                info!(session_id = %session.session_id, "Checkout session created");
                Ok(session)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Checkout session request failed");
                Err(BillingError::CheckoutUnavailable(e.to_string()))
            }
            Err(_) => {
                warn!(?timeout, "Checkout session request timed out");
                Err(BillingError::CheckoutUnavailable(format!(
                    "no response within {timeout:?}"
                )))
            }
        }
    }

    /// Schedule the user's paid subscription to end.
    ///
    /// `at: None` cancels at the end of the current period. The processor is
    /// updated first; if it refuses, nothing is written.
    #[instrument(skip(self))]
    pub async fn schedule_cancellation(
        &self,
        user_id: &UserId,
        at: Option<DateTime<Utc>>,
    ) -> Result<Subscription, BillingError> {
        let row = self
            .subscriptions
            .find_current_by_user_id(user_id.0)
            .await?
            .ok_or(BillingError::SubscriptionNotFound)?;

        if parse_status(&row)?.is_ended() || row.stripe_subscription_id.is_none() {
            return Err(BillingError::SubscriptionNotFound);
        }

        self.cancel_row(row, at).await
    }

    async fn cancel_row(
        &self,
        row: SubscriptionRow,
        at: Option<DateTime<Utc>>,
    ) -> Result<Subscription, BillingError> {
        let stripe_id = row
            .stripe_subscription_id
            .as_deref()
            .ok_or(BillingError::SubscriptionNotFound)?;

        let (patch, cancel_at) = match at {
            Some(at) => (SubscriptionPatch::cancel_at(at), at),
            None => (
                SubscriptionPatch::cancel_at_period_end(),
                row.current_period_end.unwrap_or_else(Utc::now),
            ),
        };

        self.provider.update_subscription(stripe_id, &patch).await?;

        let mut update = UpdateSubscription::from_row(&row);
        update.cancel_at = Some(cancel_at);
        if update.is_noop_for(&row) {
            return decode_subscription(row);
        }

        let row = self.subscriptions.update(update).await.map_err(conflict)?;
        info!(subscription_id = %row.id, %cancel_at, "Cancellation scheduled");
        decode_subscription(row)
    }

    /// Apply a processor event.
    ///
    /// Redelivered events are no-ops. Events older than the state they would
    /// overwrite are dropped with [`BillingError::StaleEvent`]; events naming
    /// a plan the catalog does not know are rejected.
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn apply_event(&self, event: &BillingEvent) -> Result<EventOutcome, BillingError> {
        if self.subscriptions.has_processed_event(&event.id).await? {
            debug!("Event already applied");
            return Ok(EventOutcome::Duplicate);
        }

        match &event.kind {
            BillingEventKind::CheckoutCompleted {
                user_id,
                plan,
                stripe_subscription_id,
                stripe_customer_id,
            } => {
                let plan = self.resolve_plan_ref(event, plan).await?;
                let change = Change {
                    plan_id: Some(plan.id),
                    status: SubscriptionStatus::Active,
                    period_start: None,
                    period_end: None,
                    cancel_at: None,
                    stripe_subscription_id: stripe_subscription_id.clone(),
                    stripe_customer_id: stripe_customer_id.clone(),
                };
                self.apply_to_user(event, *user_id, change).await
            }
            BillingEventKind::StatusChanged {
                stripe_subscription_id,
                stripe_customer_id,
                user_id,
                status,
                plan,
                period_start,
                period_end,
                cancel_at,
            } => {
                let plan_id = match plan {
                    Some(plan) => Some(self.resolve_plan_ref(event, plan).await?.id),
                    None => None,
                };
                let change = Change {
                    plan_id,
                    status: *status,
                    period_start: *period_start,
                    period_end: *period_end,
                    cancel_at: *cancel_at,
                    stripe_subscription_id: Some(stripe_subscription_id.clone()),
                    stripe_customer_id: stripe_customer_id.clone(),
                };

                if let Some(row) = self
                    .subscriptions
                    .find_by_stripe_id(stripe_subscription_id)
                    .await?
                {
                    return self.apply_to_row(event, row, change).await;
                }

                match user_id {
                    Some(user_id) => self.apply_to_user(event, *user_id, change).await,
                    None => {
                        warn!(
                            stripe_subscription_id = %stripe_subscription_id,
                            "Event for unknown processor subscription"
                        );
                        Err(BillingError::SubscriptionNotFound)
                    }
                }
            }
        }
    }

    async fn resolve_plan_ref(
        &self,
        event: &BillingEvent,
        plan: &PlanRef,
    ) -> Result<Plan, BillingError> {
        let resolved = match plan {
            PlanRef::Id(id) => self.catalog.get_plan(*id).await,
            PlanRef::Price(price) => self.catalog.find_by_price_id(price).await,
        };

        resolved.inspect_err(|e| {
            if e.is_not_found() {
                warn!(event_id = %event.id, plan = %plan, "Event references an unknown plan");
            }
        })
    }

    /// Apply to the user's current row, or start a new one
    async fn apply_to_user(
        &self,
        event: &BillingEvent,
        user_id: UserId,
        change: Change,
    ) -> Result<EventOutcome, BillingError> {
        let current = self.subscriptions.find_current_by_user_id(user_id.0).await?;

        match current {
            Some(row) if !starts_new_row(&row, &change)? => {
                self.apply_to_row(event, row, change).await
            }
            current => {
                let mut guard = current.as_ref().map_or_else(
                    || SubscriptionGuard::absent(user_id.0),
                    SubscriptionRow::guard,
                );

                let replacing = match &current {
                    Some(row) => replaces_live_subscription(row, &change)?,
                    None => false,
                };
                if let Some(live) = current.filter(|_| replacing) {
                    if !change.status.grants_plan() {
                        info!(
                            subscription_id = %live.id,
                            status = %change.status,
                            "Unpaid replacement left behind the live subscription"
                        );
                        self.record_only(&event.id).await?;
                        return Ok(EventOutcome::Unchanged);
                    }

                    // The old processor subscription runs out its paid period
                    let replaced = if live.cancel_at.is_some() {
                        decode_subscription(live)?
                    } else {
                        self.cancel_row(live, None).await?
                    };
                    info!(subscription_id = %replaced.id, "Replaced subscription set to end");
                    guard = SubscriptionGuard {
                        user_id: user_id.0,
                        subscription_id: Some(replaced.id.0),
                        version: replaced.version,
                    };
                }

                let plan_id = match change.plan_id {
                    Some(plan_id) => plan_id,
                    None => self.catalog.free_plan().await?.id,
                };

                let created = self
                    .subscriptions
                    .create(CreateSubscription {
                        id: Uuid::new_v4(),
                        user_id: user_id.0,
                        plan_id: plan_id.0,
                        status: change.status.as_str().to_string(),
                        current_period_start: change.period_start,
                        current_period_end: change.period_end,
                        stripe_subscription_id: change.stripe_subscription_id,
                        stripe_customer_id: change.stripe_customer_id.map(|c| c.0),
                        last_event_at: Some(event.occurred_at),
                        guard,
                        event_id: Some(event.id.clone()),
                    })
                    .await;

                match created {
                    Ok(row) => {
                        info!(subscription_id = %row.id, status = %row.status, "Subscription created from event");
                        Ok(EventOutcome::Applied)
                    }
                    Err(DbError::Duplicate(_)) => Ok(EventOutcome::Duplicate),
                    Err(e) => Err(conflict(e)),
                }
            }
        }
    }

    /// Overwrite a stored row with an event's view of it
    async fn apply_to_row(
        &self,
        event: &BillingEvent,
        row: SubscriptionRow,
        change: Change,
    ) -> Result<EventOutcome, BillingError> {
        if row
            .last_event_at
            .is_some_and(|last| last > event.occurred_at)
        {
            warn!(
                subscription_id = %row.id,
                occurred_at = %event.occurred_at,
                "Dropping event older than the stored state"
            );
            self.record_only(&event.id).await?;
            return Err(BillingError::StaleEvent(event.id.clone()));
        }

        let mut update = UpdateSubscription::from_row(&row);
        if let Some(plan_id) = change.plan_id {
            update.plan_id = plan_id.0;
        }
        update.status = change.status.as_str().to_string();
        update.current_period_start = change.period_start.or(row.current_period_start);
        update.current_period_end = change.period_end.or(row.current_period_end);
        update.cancel_at = change.cancel_at;
        if change.stripe_subscription_id.is_some() {
            update.stripe_subscription_id = change.stripe_subscription_id;
        }
        if let Some(customer) = change.stripe_customer_id {
            update.stripe_customer_id = Some(customer.0);
        }

        let unchanged = update.is_noop_for(&row);
        if unchanged && row.last_event_at == Some(event.occurred_at) {
            self.record_only(&event.id).await?;
            return Ok(EventOutcome::Unchanged);
        }

        update.last_event_at = Some(event.occurred_at);
        update.event_id = Some(event.id.clone());

        match self.subscriptions.update(update).await {
            Ok(updated) => {
                if unchanged {
                    return Ok(EventOutcome::Unchanged);
                }
                info!(
                    subscription_id = %updated.id,
                    status = %updated.status,
                    version = updated.version,
                    "Subscription updated from event"
                );
                Ok(EventOutcome::Applied)
            }
            Err(DbError::Duplicate(_)) => Ok(EventOutcome::Duplicate),
            Err(e) => Err(conflict(e)),
        }
    }

    async fn record_only(&self, event_id: &str) -> Result<(), BillingError> {
        match self.subscriptions.record_event(event_id).await {
            Ok(()) | Err(DbError::Duplicate(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Field values an event asserts
struct Change {
    plan_id: Option<PlanId>,
    status: SubscriptionStatus,
    period_start: Option<DateTime<Utc>>,
    period_end: Option<DateTime<Utc>>,
    cancel_at: Option<DateTime<Utc>>,
    stripe_subscription_id: Option<String>,
    stripe_customer_id: Option<CustomerId>,
}

/// Ended rows and rows of another processor subscription stay as history
fn starts_new_row(row: &SubscriptionRow, change: &Change) -> Result<bool, BillingError> {
    let ended = parse_status(row)?.is_ended();
    let other_subscription = match (&row.stripe_subscription_id, &change.stripe_subscription_id) {
        (Some(stored), Some(incoming)) => stored != incoming,
        _ => false,
    };
    let same_subscription = row.stripe_subscription_id.is_some()
        && row.stripe_subscription_id == change.stripe_subscription_id;

    Ok(other_subscription || (ended && !same_subscription))
}

/// A different processor subscription arriving while the stored one still runs
fn replaces_live_subscription(
    row: &SubscriptionRow,
    change: &Change,
) -> Result<bool, BillingError> {
    let other = match (&row.stripe_subscription_id, &change.stripe_subscription_id) {
        (Some(stored), Some(incoming)) => stored != incoming,
        _ => false,
    };

    Ok(other && !parse_status(row)?.is_ended())
}

fn parse_status(row: &SubscriptionRow) -> Result<SubscriptionStatus, BillingError> {
    row.status.parse().map_err(|e| {
        BillingError::Internal(format!("subscription {} has {e}", row.id))
    })
}

/// Decode a stored subscription
pub fn decode_subscription(row: SubscriptionRow) -> Result<Subscription, BillingError> {
    let status = parse_status(&row)?;

    Ok(Subscription {
        id: SubscriptionId(row.id),
        user_id: UserId(row.user_id),
        plan_id: PlanId(row.plan_id),
        status,
        current_period_start: row.current_period_start,
        current_period_end: row.current_period_end,
        cancel_at: row.cancel_at,
        stripe_subscription_id: row.stripe_subscription_id,
        stripe_customer_id: row.stripe_customer_id.map(CustomerId),
        last_event_at: row.last_event_at,
        version: row.version,
        is_virtual: false,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// Version conflicts surface as retryable concurrent modifications
fn conflict(err: DbError) -> BillingError {
    match err {
        DbError::VersionConflict(msg) => BillingError::ConcurrentModification(msg),
        other => other.into(),
    }
}
