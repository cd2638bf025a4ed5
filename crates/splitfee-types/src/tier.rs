//! Plan tier and commission role types

use serde::{Deserialize, Serialize};

/// Commission plan tiers, declared in rank order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Free tier
    Free,
    /// Pro tier
    Pro,
    /// Partner tier
    Partner,
}

impl Tier {
    /// All tiers, lowest rank first
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Pro, Tier::Partner];

    /// Slug used in storage and on the wire
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Partner => "partner",
        }
    }

    /// Display rank (0 = lowest)
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Free => 0,
            Self::Pro => 1,
            Self::Partner => 2,
        }
    }

    /// Human-readable name
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Pro => "Pro",
            Self::Partner => "Partner",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = TierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "partner" => Ok(Self::Partner),
            _ => Err(TierParseError(s.to_string())),
        }
    }
}

/// Error parsing a tier string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid tier: {0}")]
pub struct TierParseError(pub String);

/// Tier as stored on a catalog plan.
///
/// The catalog is maintained outside the engine and may carry a slug this
/// build does not know yet. Such plans still list and display, but never
/// resolve to a commission rate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlanTier {
    /// One of the known tiers
    Known(Tier),
    /// A slug this build does not recognize
    Unrecognized(String),
}

impl PlanTier {
    /// Parse a stored slug, keeping unknown slugs
    pub fn from_slug(slug: &str) -> Self {
        slug.parse()
            .map_or_else(|_| Self::Unrecognized(slug.to_string()), Self::Known)
    }

    /// Stored slug
    pub fn slug(&self) -> &str {
        match self {
            Self::Known(tier) => tier.as_str(),
            Self::Unrecognized(slug) => slug,
        }
    }

    /// Known tier, if any
    pub fn tier(&self) -> Result<Tier, TierParseError> {
        match self {
            Self::Known(tier) => Ok(*tier),
            Self::Unrecognized(slug) => Err(TierParseError(slug.clone())),
        }
    }

    /// Name shown to users; unknown tiers get a generic label
    pub fn display_name(&self) -> &str {
        match self {
            Self::Known(tier) => tier.display_name(),
            Self::Unrecognized(_) => "Custom plan",
        }
    }

    /// Sort key: known tiers by rank, unknown slugs after all of them
    pub fn sort_key(&self) -> (u8, &str) {
        match self {
            Self::Known(tier) => (tier.rank(), ""),
            Self::Unrecognized(slug) => (u8::MAX, slug),
        }
    }
}

impl From<Tier> for PlanTier {
    fn from(tier: Tier) -> Self {
        Self::Known(tier)
    }
}

impl From<String> for PlanTier {
    fn from(slug: String) -> Self {
        Self::from_slug(&slug)
    }
}

impl From<PlanTier> for String {
    fn from(tier: PlanTier) -> Self {
        tier.slug().to_string()
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// Participant role in a placement whose earnings depend on tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionRole {
    /// Recruiter representing the candidate
    CandidateRecruiter,
    /// Recruiter who owns the job posting
    JobOwner,
    /// Recruiter representing the hiring company
    CompanyRecruiter,
    /// Sourcing bonus
    Sourcer,
}

impl CommissionRole {
    /// All roles
    pub const ALL: [CommissionRole; 4] = [
        CommissionRole::CandidateRecruiter,
        CommissionRole::JobOwner,
        CommissionRole::CompanyRecruiter,
        CommissionRole::Sourcer,
    ];

    /// Slug used in storage and on the wire
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CandidateRecruiter => "candidate_recruiter",
            Self::JobOwner => "job_owner",
            Self::CompanyRecruiter => "company_recruiter",
            Self::Sourcer => "sourcer",
        }
    }
}

impl std::fmt::Display for CommissionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommissionRole {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "candidate_recruiter" => Ok(Self::CandidateRecruiter),
            "job_owner" => Ok(Self::JobOwner),
            "company_recruiter" => Ok(Self::CompanyRecruiter),
            "sourcer" => Ok(Self::Sourcer),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

/// Error parsing a commission role string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role: {0}")]
pub struct RoleParseError(pub String);
