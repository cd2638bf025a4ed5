//! Billing errors

use std::time::Duration;

use thiserror::Error;

use splitfee_db::DbError;
use splitfee_types::{
    CommissionRole, ErrorKind, PayoutId, PayoutStatus, PlacementId, PlanId, RoleParseError,
    TierParseError,
};

/// Billing errors
#[derive(Error, Debug)]
pub enum BillingError {
    /// Tier slug outside the closed tier set
    #[error("invalid tier: {0}")]
    InvalidTier(String),

    /// Role slug outside the closed role set
    #[error("invalid role: {0}")]
    InvalidRole(String),

    /// Catalog row that cannot be turned into a plan
    #[error("malformed plan {plan}: {reason}")]
    MalformedPlan {
        /// Plan ID or slug
        plan: String,
        /// What is wrong with it
        reason: String,
    },

    /// Payout amount must be positive
    #[error("invalid payout amount: {0}")]
    InvalidAmount(i64),

    /// Plan exists but is not offered
    #[error("plan {0} is not available")]
    InactivePlan(PlanId),

    /// Paid plans go through checkout
    #[error("plan {0} requires checkout")]
    CheckoutRequired(PlanId),

    /// Placement without any participant
    #[error("placement {0} has no participants")]
    EmptyPlacement(PlacementId),

    /// Payout requested for a role that did not take part
    #[error("role {role} has no entry in the snapshot of placement {placement_id}")]
    RoleNotInSnapshot {
        /// Placement
        placement_id: PlacementId,
        /// Requested role
        role: CommissionRole,
    },

    /// Payout status change the state machine forbids
    #[error("invalid payout transition: {from} -> {to}")]
    InvalidPayoutTransition {
        /// Current status
        from: PayoutStatus,
        /// Requested status
        to: PayoutStatus,
    },

    /// Webhook verification or processing error
    #[error("webhook error: {0}")]
    WebhookError(String),

    /// A payout for this placement and role already exists
    #[error("payout already recorded for placement {placement_id} role {role}")]
    DuplicatePayout {
        /// Placement
        placement_id: PlacementId,
        /// Role
        role: CommissionRole,
    },

    /// The placement already has a commission snapshot
    #[error("commission snapshot already exists for placement {0}")]
    SnapshotExists(PlacementId),

    /// Processor event older than the state it would overwrite
    #[error("stale event {0}")]
    StaleEvent(String),

    /// A participant's subscription changed between resolution and commit
    #[error("subscription of user {0} changed during commission resolution")]
    ConcurrentPlanChange(String),

    /// Row changed since it was read
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    /// Checkout handle could not be obtained
    #[error("checkout unavailable: {0}")]
    CheckoutUnavailable(String),

    /// Payment provider error
    #[error("provider error: {0}")]
    ProviderError(String),

    /// Plan change not confirmed in time
    #[error("plan change not confirmed after {0:?}")]
    ConfirmationTimeout(Duration),

    /// Unknown plan reference
    #[error("plan not found: {0}")]
    PlanNotFound(String),

    /// Subscription not found
    #[error("subscription not found")]
    SubscriptionNotFound,

    /// Payout not found
    #[error("payout not found: {0}")]
    PayoutNotFound(PayoutId),

    /// No snapshot was taken for the placement
    #[error("no commission snapshot for placement {0}")]
    SnapshotNotFound(PlacementId),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] DbError),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl BillingError {
    /// Taxonomy class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTier(_)
            | Self::InvalidRole(_)
            | Self::MalformedPlan { .. }
            | Self::InvalidAmount(_)
            | Self::InactivePlan(_)
            | Self::CheckoutRequired(_)
            | Self::EmptyPlacement(_)
            | Self::RoleNotInSnapshot { .. }
            | Self::InvalidPayoutTransition { .. }
            | Self::WebhookError(_) => ErrorKind::Validation,

            Self::DuplicatePayout { .. }
            | Self::SnapshotExists(_)
            | Self::StaleEvent(_)
            | Self::ConcurrentPlanChange(_)
            | Self::ConcurrentModification(_)
            | Self::Database(DbError::Duplicate(_) | DbError::VersionConflict(_)) => {
                ErrorKind::Conflict
            }

            Self::CheckoutUnavailable(_)
            | Self::ProviderError(_)
            | Self::ConfirmationTimeout(_) => ErrorKind::UpstreamUnavailable,

            Self::PlanNotFound(_)
            | Self::SubscriptionNotFound
            | Self::PayoutNotFound(_)
            | Self::SnapshotNotFound(_)
            | Self::Database(DbError::NotFound) => ErrorKind::NotFound,

            Self::Database(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if the caller may retry unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Conflict | ErrorKind::UpstreamUnavailable
        )
    }

    /// Check if this is a provider error
    pub fn is_provider_error(&self) -> bool {
        matches!(self, Self::ProviderError(_) | Self::CheckoutUnavailable(_))
    }
}

impl From<TierParseError> for BillingError {
    fn from(err: TierParseError) -> Self {
        Self::InvalidTier(err.0)
    }
}

impl From<RoleParseError> for BillingError {
    fn from(err: RoleParseError) -> Self {
        Self::InvalidRole(err.0)
    }
}
