//! Commission rate and snapshot types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CommissionRole, PlacementId, Tier, UserId};

/// Commission rate as a whole percentage of the placement fee
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommissionRate(u8);

impl CommissionRate {
    /// Create a rate; `None` above 100%
    pub const fn new(percent: u8) -> Option<Self> {
        if percent > 100 {
            None
        } else {
            Some(Self(percent))
        }
    }

    /// Whole percentage
    pub const fn percent(self) -> u8 {
        self.0
    }

    /// Commission owed on a fee, rounded down to the minor unit
    pub fn commission_on(self, fee_cents: i64) -> i64 {
        fee_cents * i64::from(self.0) / 100
    }
}

impl std::fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// The rate one participant earns, as resolved at hire time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Participant role
    pub role: CommissionRole,
    /// Participant
    pub user_id: UserId,
    /// Tier the participant was on at resolution time
    pub tier: Tier,
    /// Resolved rate
    pub rate: CommissionRate,
}

/// Immutable record of the rates locked in when a candidate was hired
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSnapshot {
    /// Placement the snapshot belongs to
    pub placement_id: PlacementId,
    /// Resolution time
    pub resolved_at: DateTime<Utc>,
    /// One entry per participating role
    pub entries: Vec<SnapshotEntry>,
}

impl CommissionSnapshot {
    /// Entry for a role, if that role took part in the placement
    pub fn entry(&self, role: CommissionRole) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|e| e.role == role)
    }
}

/// Participants of a placement at hire time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementParticipants {
    /// Placement being finalized
    pub placement_id: PlacementId,
    /// Recruiter representing the candidate
    pub candidate_recruiter: Option<UserId>,
    /// Recruiter who owns the job
    pub job_owner: Option<UserId>,
    /// Recruiter representing the company
    pub company_recruiter: Option<UserId>,
    /// Sourcer earning the sourcing bonus
    pub sourcer: Option<UserId>,
}

impl PlacementParticipants {
    /// Placement with no participants yet
    pub fn new(placement_id: PlacementId) -> Self {
        Self {
            placement_id,
            candidate_recruiter: None,
            job_owner: None,
            company_recruiter: None,
            sourcer: None,
        }
    }

    /// Set the participant for a role
    #[must_use]
    pub fn with(mut self, role: CommissionRole, user_id: UserId) -> Self {
        match role {
            CommissionRole::CandidateRecruiter => self.candidate_recruiter = Some(user_id),
            CommissionRole::JobOwner => self.job_owner = Some(user_id),
            CommissionRole::CompanyRecruiter => self.company_recruiter = Some(user_id),
            CommissionRole::Sourcer => self.sourcer = Some(user_id),
        }
        self
    }

    /// Present participants in role order
    pub fn iter(&self) -> impl Iterator<Item = (CommissionRole, UserId)> + '_ {
        CommissionRole::ALL.into_iter().filter_map(move |role| {
            let user = match role {
                CommissionRole::CandidateRecruiter => self.candidate_recruiter,
                CommissionRole::JobOwner => self.job_owner,
                CommissionRole::CompanyRecruiter => self.company_recruiter,
                CommissionRole::Sourcer => self.sourcer,
            };
            user.map(|u| (role, u))
        })
    }
}
