//! Payout ledger
//!
//! Payouts are created against a commission snapshot, so the recipient is
//! always the participant the snapshot recorded. At most one payout exists
//! per placement and role. Corrections are separate rows without a
//! placement and may be negative.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use splitfee_db::{CreatePayout, DbError, PayoutRepository, PayoutRow};
use splitfee_types::{
    BillingStats, CommissionRole, CommissionSnapshot, Payout, PayoutId, PayoutStatus,
    PlacementId, UserId,
};

use crate::error::BillingError;

/// Payout ledger operations
#[derive(Clone)]
pub struct PayoutLedger {
    payouts: Arc<dyn PayoutRepository>,
    currency: String,
}

impl PayoutLedger {
    /// Create a ledger paying out in `currency`
    pub fn new(payouts: Arc<dyn PayoutRepository>, currency: impl Into<String>) -> Self {
        Self {
            payouts,
            currency: currency.into(),
        }
    }

    /// Record the payout owed to one role of a snapshotted placement
    #[instrument(skip(self, snapshot), fields(placement_id = %snapshot.placement_id))]
    pub async fn record_payout(
        &self,
        snapshot: &CommissionSnapshot,
        role: CommissionRole,
        amount_cents: i64,
    ) -> Result<Payout, BillingError> {
        let placement_id = snapshot.placement_id;
        let entry = snapshot
            .entry(role)
            .ok_or(BillingError::RoleNotInSnapshot { placement_id, role })?;

        if amount_cents <= 0 {
            return Err(BillingError::InvalidAmount(amount_cents));
        }

        let row = self
            .payouts
            .create(CreatePayout {
                id: Uuid::new_v4(),
                user_id: entry.user_id.0,
                placement_id: Some(placement_id.0),
                role: Some(role.as_str().to_string()),
                amount_cents,
                currency: self.currency.clone(),
                scheduled_for: None,
            })
            .await
            .map_err(|e| match e {
                DbError::Duplicate(_) => BillingError::DuplicatePayout { placement_id, role },
                other => other.into(),
            })?;

        info!(payout_id = %row.id, user_id = %row.user_id, amount_cents, "Payout recorded");
        decode_payout(row)
    }

    /// Record an adjustment against an existing payout.
    ///
    /// The correction goes to the same recipient in the same currency and
    /// carries no placement, so it never collides with the placement's own
    /// payout. A negative amount offsets the original, never below zero.
    #[instrument(skip(self))]
    pub async fn record_correction(
        &self,
        payout_id: PayoutId,
        amount_cents: i64,
    ) -> Result<Payout, BillingError> {
        let original = self
            .payouts
            .find_by_id(payout_id.0)
            .await?
            .ok_or(BillingError::PayoutNotFound(payout_id))?;

        let offsets_too_much = original
            .amount_cents
            .checked_add(amount_cents)
            .map_or(true, |net| net < 0);
        if amount_cents == 0 || offsets_too_much {
            return Err(BillingError::InvalidAmount(amount_cents));
        }

        let row = self
            .payouts
            .create(CreatePayout {
                id: Uuid::new_v4(),
                user_id: original.user_id,
                placement_id: None,
                role: None,
                amount_cents,
                currency: original.currency.clone(),
                scheduled_for: None,
            })
            .await?;

        info!(
            payout_id = %row.id,
            corrects = %payout_id,
            user_id = %row.user_id,
            amount_cents,
            "Correction recorded"
        );
        decode_payout(row)
    }

    /// A user's payouts, newest first
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Payout>, BillingError> {
        let rows = self.payouts.find_by_user_id(user_id.0).await?;

        let mut payouts = rows
            .into_iter()
            .map(decode_payout)
            .collect::<Result<Vec<_>, _>>()?;
        payouts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.0.cmp(&a.id.0)));

        Ok(payouts)
    }

    /// Move a payout through its lifecycle
    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        payout_id: PayoutId,
        to: PayoutStatus,
    ) -> Result<Payout, BillingError> {
        let row = self
            .payouts
            .find_by_id(payout_id.0)
            .await?
            .ok_or(BillingError::PayoutNotFound(payout_id))?;

        let from = parse_status(&row)?;
        if !from.can_transition_to(to) {
            return Err(BillingError::InvalidPayoutTransition { from, to });
        }

        let completed_at = (to == PayoutStatus::Completed).then(Utc::now);
        let row = self
            .payouts
            .update_status(payout_id.0, from.as_str(), to.as_str(), completed_at)
            .await
            .map_err(|e| match e {
                DbError::VersionConflict(msg) => BillingError::ConcurrentModification(msg),
                DbError::NotFound => BillingError::PayoutNotFound(payout_id),
                other => other.into(),
            })?;

        info!(%from, %to, "Payout status changed");
        decode_payout(row)
    }

    /// Earnings summary for a user as of now
    pub async fn aggregate(&self, user_id: &UserId) -> Result<BillingStats, BillingError> {
        self.aggregate_as_of(user_id, Utc::now()).await
    }

    /// Earnings summary with the calendar year taken from `as_of`
    pub async fn aggregate_as_of(
        &self,
        user_id: &UserId,
        as_of: DateTime<Utc>,
    ) -> Result<BillingStats, BillingError> {
        let payouts = self.list_for_user(user_id).await?;
        Ok(summarize(&payouts, as_of))
    }
}

/// Fold payouts into earnings stats.
///
/// Completed payouts count as earnings in the UTC calendar year they were
/// completed in; the rest are dated by creation. Pending and processing
/// payouts count as pending, on-hold ones separately. Failed payouts count
/// nowhere.
pub fn summarize(payouts: &[Payout], as_of: DateTime<Utc>) -> BillingStats {
    let year = as_of.year();
    let mut stats = BillingStats::default();
    let mut placements_total: HashSet<PlacementId> = HashSet::new();
    let mut placements_ytd: HashSet<PlacementId> = HashSet::new();

    for payout in payouts {
        let booked_at = match payout.status {
            PayoutStatus::Completed => payout.completed_at.unwrap_or(payout.created_at),
            _ => payout.created_at,
        };
        let this_year = booked_at.year() == year;

        match payout.status {
            PayoutStatus::Completed => {
                stats.lifetime_earnings_cents += payout.amount_cents;
                if this_year {
                    stats.ytd_earnings_cents += payout.amount_cents;
                }
            }
            PayoutStatus::Pending | PayoutStatus::Processing => {
                stats.pending_cents += payout.amount_cents;
            }
            PayoutStatus::OnHold => stats.on_hold_cents += payout.amount_cents,
            PayoutStatus::Failed => continue,
        }

        if let Some(placement_id) = payout.placement_id {
            placements_total.insert(placement_id);
            if this_year {
                placements_ytd.insert(placement_id);
            }
        }
    }

    stats.placements_total = u32::try_from(placements_total.len()).unwrap_or(u32::MAX);
    stats.placements_ytd = u32::try_from(placements_ytd.len()).unwrap_or(u32::MAX);
    stats
}

fn parse_status(row: &PayoutRow) -> Result<PayoutStatus, BillingError> {
    row.status
        .parse()
        .map_err(|e| BillingError::Internal(format!("payout {} has {e}", row.id)))
}

/// Decode a stored payout
pub fn decode_payout(row: PayoutRow) -> Result<Payout, BillingError> {
    let status = parse_status(&row)?;
    let role: Option<CommissionRole> = row
        .role
        .as_deref()
        .map(str::parse::<CommissionRole>)
        .transpose()?;

    Ok(Payout {
        id: row.payout_id(),
        user_id: UserId(row.user_id),
        placement_id: row.placement_id.map(PlacementId),
        role,
        amount_cents: row.amount_cents,
        currency: row.currency,
        status,
        scheduled_for: row.scheduled_for,
        completed_at: row.completed_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
