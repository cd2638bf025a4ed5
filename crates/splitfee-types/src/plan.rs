//! Plan catalog types

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::{PlanTier, PriceId, ProductId};

/// Unique plan identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(pub Uuid);

impl PlanId {
    /// Create a new random plan ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a plan ID from a string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for PlanId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Purchasable plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan ID
    pub id: PlanId,
    /// Tier slug
    pub tier: PlanTier,
    /// Display name
    pub name: String,
    /// Monthly price in minor currency units
    pub monthly_price_cents: i64,
    /// Feature flags
    pub features: PlanFeatures,
    /// Stripe product reference
    pub stripe_product_id: Option<ProductId>,
    /// Stripe price reference
    pub stripe_price_id: Option<PriceId>,
    /// Whether the plan can be selected
    pub is_active: bool,
}

impl Plan {
    /// Whether selecting this plan moves money
    pub fn is_paid(&self) -> bool {
        self.monthly_price_cents > 0
    }
}

/// Current feature schema version
pub const PLAN_FEATURES_VERSION: u32 = 1;

/// Stored sentinel for an unlimited application allowance
pub const UNLIMITED_APPLICATIONS: i64 = -1;

/// Plan feature flags (schema version 1).
///
/// Decoding is strict: unknown keys and a missing or invalid
/// `applications_per_month` are rejected. Absent booleans decode as `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanFeatures {
    /// Schema version; defaults to the current version when absent
    #[serde(default = "current_features_version")]
    pub version: u32,
    /// Monthly job application allowance
    pub applications_per_month: ApplicationLimit,
    /// Access to the shared candidate database
    #[serde(default)]
    pub candidate_database: bool,
    /// Boosted placement in job listings
    #[serde(default)]
    pub priority_listing: bool,
    /// Earnings and pipeline analytics
    #[serde(default)]
    pub analytics_dashboard: bool,
    /// Dedicated account manager
    #[serde(default)]
    pub dedicated_support: bool,
    /// Programmatic access
    #[serde(default)]
    pub api_access: bool,
}

fn current_features_version() -> u32 {
    PLAN_FEATURES_VERSION
}

impl PlanFeatures {
    /// Decode feature flags from their stored JSON form
    pub fn from_json(value: serde_json::Value) -> Result<Self, PlanFeaturesError> {
        let features: Self = serde_json::from_value(value)
            .map_err(|e| PlanFeaturesError::Decode(e.to_string()))?;
        if features.version != PLAN_FEATURES_VERSION {
            return Err(PlanFeaturesError::UnsupportedVersion(features.version));
        }
        Ok(features)
    }

    /// Encode feature flags for storage
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "version": self.version,
            "applications_per_month": self.applications_per_month.to_stored(),
            "candidate_database": self.candidate_database,
            "priority_listing": self.priority_listing,
            "analytics_dashboard": self.analytics_dashboard,
            "dedicated_support": self.dedicated_support,
            "api_access": self.api_access,
        })
    }
}

/// Error decoding plan features
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanFeaturesError {
    /// JSON did not match the feature schema
    #[error("invalid feature flags: {0}")]
    Decode(String),

    /// Schema version this build cannot read
    #[error("unsupported feature schema version: {0}")]
    UnsupportedVersion(u32),
}

/// Monthly application allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplicationLimit {
    /// At most this many applications per month
    Limited(u32),
    /// No limit
    Unlimited,
}

impl ApplicationLimit {
    /// Decode the stored integer form
    pub fn from_stored(value: i64) -> Option<Self> {
        if value == UNLIMITED_APPLICATIONS {
            return Some(Self::Unlimited);
        }
        u32::try_from(value).ok().map(Self::Limited)
    }

    /// Stored integer form
    pub fn to_stored(self) -> i64 {
        match self {
            Self::Limited(n) => i64::from(n),
            Self::Unlimited => UNLIMITED_APPLICATIONS,
        }
    }

    /// Whether `used` applications still leave room for one more
    pub fn allows(self, used: u32) -> bool {
        match self {
            Self::Limited(n) => used < n,
            Self::Unlimited => true,
        }
    }
}

impl Serialize for ApplicationLimit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.to_stored())
    }
}

impl<'de> Deserialize<'de> for ApplicationLimit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Self::from_stored(raw).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid applications_per_month: {raw}"))
        })
    }
}
