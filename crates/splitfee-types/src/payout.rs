//! Payout types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CommissionRole, PlacementId, UserId};

/// Unique payout identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayoutId(pub Uuid);

impl PayoutId {
    /// Create a new random payout ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PayoutId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PayoutId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payout status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    /// Scheduled, not yet sent
    Pending,
    /// Handed to the disbursement rail
    Processing,
    /// Paid out
    Completed,
    /// Disbursement failed
    Failed,
    /// Held for manual review
    OnHold,
}

impl PayoutStatus {
    /// All statuses
    pub const ALL: [PayoutStatus; 5] = [
        PayoutStatus::Pending,
        PayoutStatus::Processing,
        PayoutStatus::Completed,
        PayoutStatus::Failed,
        PayoutStatus::OnHold,
    ];

    /// Slug used in storage and on the wire
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::OnHold => "on_hold",
        }
    }

    /// Whether no further transition is possible
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether the payout can be retried from this status
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed | Self::OnHold)
    }

    /// Whether `self -> next` is an allowed transition
    pub const fn can_transition_to(&self, next: PayoutStatus) -> bool {
        match (*self, next) {
            (Self::Pending, Self::Processing)
            | (Self::Processing, Self::Completed | Self::Failed)
            | (Self::Pending | Self::Processing | Self::Failed, Self::OnHold)
            | (Self::Failed | Self::OnHold, Self::Pending) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PayoutStatus {
    type Err = PayoutStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "on_hold" => Ok(Self::OnHold),
            _ => Err(PayoutStatusParseError(s.to_string())),
        }
    }
}

/// Error parsing a payout status string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid payout status: {0}")]
pub struct PayoutStatusParseError(pub String);

/// A single commission disbursement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    /// Payout ID
    pub id: PayoutId,
    /// Recipient
    pub user_id: UserId,
    /// Placement the commission was earned on
    pub placement_id: Option<PlacementId>,
    /// Role the commission was earned in
    pub role: Option<CommissionRole>,
    /// Amount in minor currency units
    pub amount_cents: i64,
    /// Currency (e.g., "usd")
    pub currency: String,
    /// Status
    pub status: PayoutStatus,
    /// When the payout is scheduled to be sent
    pub scheduled_for: Option<DateTime<Utc>>,
    /// When the payout completed
    pub completed_at: Option<DateTime<Utc>>,
    /// When the payout was recorded
    pub created_at: DateTime<Utc>,
    /// When the status last changed
    pub updated_at: DateTime<Utc>,
}

/// Earnings aggregate for a user, recomputed on every read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingStats {
    /// Completed payouts in the current calendar year
    pub ytd_earnings_cents: i64,
    /// Completed payouts, all time
    pub lifetime_earnings_cents: i64,
    /// Pending and processing payouts
    pub pending_cents: i64,
    /// Payouts held for review
    pub on_hold_cents: i64,
    /// Distinct placements with a payout this year
    pub placements_ytd: u32,
    /// Distinct placements with a payout, all time
    pub placements_total: u32,
}
