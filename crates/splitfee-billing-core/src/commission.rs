//! Commission resolution and hire-time snapshots
//!
//! Rates are always resolved from the participant's current effective
//! subscription; nothing is cached. A snapshot freezes the resolved rates of
//! every participant at hire time and is never recomputed afterwards.
//!
//! Taking a snapshot is two-phase. [`CommissionResolver::prepare_snapshot`]
//! resolves every role and remembers the subscription version each rate was
//! derived from; [`CommissionResolver::commit_snapshot`] refuses to persist
//! if any of those subscriptions moved in between.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use splitfee_db::{
    CommissionRepository, CommissionSnapshotRow, CreateSnapshot, CreateSnapshotEntry, DbError,
    SubscriptionGuard, SubscriptionRepository,
};
use splitfee_types::{
    CommissionRate, CommissionRole, CommissionSnapshot, PlacementId, PlacementParticipants,
    SnapshotEntry, Tier, UserId,
};

use crate::error::BillingError;
use crate::rates::rate_for;
use crate::subscription::{EffectiveSubscription, SubscriptionService};

/// A participant's current commission rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRate {
    /// Participant
    pub user_id: UserId,
    /// Role resolved for
    pub role: CommissionRole,
    /// Tier of the plan in effect
    pub tier: Tier,
    /// Rate for that tier and role
    pub rate: CommissionRate,
}

/// Resolved snapshot that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSnapshot {
    /// Placement
    pub placement_id: PlacementId,
    /// When rates were resolved
    pub resolved_at: DateTime<Utc>,
    /// One entry per present role, in role order
    pub entries: Vec<SnapshotEntry>,
    /// Subscription state of each distinct participant at resolution time
    pub guards: Vec<SubscriptionGuard>,
}

/// Resolves rates and records snapshots
#[derive(Clone)]
pub struct CommissionResolver {
    subscriptions: SubscriptionService,
    subscription_store: Arc<dyn SubscriptionRepository>,
    commissions: Arc<dyn CommissionRepository>,
}

impl CommissionResolver {
    /// Create a new resolver
    pub fn new(
        subscriptions: SubscriptionService,
        subscription_store: Arc<dyn SubscriptionRepository>,
        commissions: Arc<dyn CommissionRepository>,
    ) -> Self {
        Self {
            subscriptions,
            subscription_store,
            commissions,
        }
    }

    /// Current rate of a user in a role
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        user_id: &UserId,
        role: CommissionRole,
    ) -> Result<ResolvedRate, BillingError> {
        let effective = self.subscriptions.effective_subscription(user_id).await?;
        resolved(&effective, role)
    }

    /// Resolve every participant of a placement without persisting anything
    #[instrument(skip(self, participants), fields(placement_id = %participants.placement_id))]
    pub async fn prepare_snapshot(
        &self,
        participants: &PlacementParticipants,
    ) -> Result<PendingSnapshot, BillingError> {
        // One read per distinct user keeps a user in two roles consistent
        let mut effective: HashMap<UserId, EffectiveSubscription> = HashMap::new();
        let mut entries = Vec::new();

        for (role, user_id) in participants.iter() {
            let rate = match effective.get(&user_id) {
                Some(sub) => resolved(sub, role)?,
                None => {
                    let sub = self.subscriptions.effective_subscription(&user_id).await?;
                    let rate = resolved(&sub, role)?;
                    effective.insert(user_id, sub);
                    rate
                }
            };
            entries.push(SnapshotEntry {
                role,
                user_id,
                tier: rate.tier,
                rate: rate.rate,
            });
        }

        if entries.is_empty() {
            return Err(BillingError::EmptyPlacement(participants.placement_id));
        }

        let mut guards: Vec<SubscriptionGuard> =
            effective.values().map(EffectiveSubscription::guard).collect();
        guards.sort_by_key(|g| g.user_id);

        Ok(PendingSnapshot {
            placement_id: participants.placement_id,
            resolved_at: Utc::now(),
            entries,
            guards,
        })
    }

    /// Persist a prepared snapshot if no participant's plan moved since
    #[instrument(skip(self, pending), fields(placement_id = %pending.placement_id))]
    pub async fn commit_snapshot(
        &self,
        pending: PendingSnapshot,
    ) -> Result<CommissionSnapshot, BillingError> {
        for guard in &pending.guards {
            let current = self
                .subscription_store
                .find_current_by_user_id(guard.user_id)
                .await?;
            if !guard.matches(current.as_ref()) {
                warn!(user_id = %guard.user_id, "Plan changed while resolving commission");
                return Err(BillingError::ConcurrentPlanChange(guard.user_id.to_string()));
            }
        }

        let placement_id = pending.placement_id;
        let create = CreateSnapshot {
            placement_id: placement_id.0,
            resolved_at: pending.resolved_at,
            entries: pending
                .entries
                .iter()
                .map(|entry| CreateSnapshotEntry {
                    role: entry.role.as_str().to_string(),
                    user_id: entry.user_id.0,
                    tier: entry.tier.as_str().to_string(),
                    rate_percent: i16::from(entry.rate.percent()),
                })
                .collect(),
            guards: pending.guards,
        };

        let rows = self.commissions.create(create).await.map_err(|e| match e {
            DbError::Duplicate(_) => BillingError::SnapshotExists(placement_id),
            DbError::VersionConflict(msg) => BillingError::ConcurrentPlanChange(msg),
            other => other.into(),
        })?;

        info!(entries = rows.len(), "Commission snapshot recorded");
        decode_snapshot(placement_id, rows)
    }

    /// Resolve and persist in one go
    pub async fn snapshot_placement(
        &self,
        participants: &PlacementParticipants,
    ) -> Result<CommissionSnapshot, BillingError> {
        let pending = self.prepare_snapshot(participants).await?;
        self.commit_snapshot(pending).await
    }

    /// The stored snapshot of a placement
    #[instrument(skip(self))]
    pub async fn get_snapshot(
        &self,
        placement_id: PlacementId,
    ) -> Result<CommissionSnapshot, BillingError> {
        let rows = self.commissions.find_by_placement(placement_id.0).await?;
        if rows.is_empty() {
            return Err(BillingError::SnapshotNotFound(placement_id));
        }
        decode_snapshot(placement_id, rows)
    }
}

fn resolved(
    effective: &EffectiveSubscription,
    role: CommissionRole,
) -> Result<ResolvedRate, BillingError> {
    let tier = effective.tier()?;
    Ok(ResolvedRate {
        user_id: effective.subscription.user_id,
        role,
        tier,
        rate: rate_for(tier, role),
    })
}

fn decode_snapshot(
    placement_id: PlacementId,
    rows: Vec<CommissionSnapshotRow>,
) -> Result<CommissionSnapshot, BillingError> {
    let resolved_at = rows
        .iter()
        .map(|row| row.resolved_at)
        .min()
        .ok_or(BillingError::SnapshotNotFound(placement_id))?;

    let mut entries = rows
        .into_iter()
        .map(|row| {
            let rate = u8::try_from(row.rate_percent)
                .ok()
                .and_then(CommissionRate::new)
                .ok_or_else(|| {
                    BillingError::Internal(format!(
                        "snapshot {placement_id} has rate {}",
                        row.rate_percent
                    ))
                })?;
            Ok(SnapshotEntry {
                role: row.role.parse()?,
                user_id: UserId(row.user_id),
                tier: row.tier.parse()?,
                rate,
            })
        })
        .collect::<Result<Vec<_>, BillingError>>()?;
    entries.sort_by_key(|entry| entry.role);

    Ok(CommissionSnapshot {
        placement_id,
        resolved_at,
        entries,
    })
}
