//! Commission rate table
//!
//! A pure lookup from (tier, role) to the share of the placement fee the
//! participant earns. The table is compiled in; no tier or role defaults.

use serde::Serialize;

use splitfee_types::{CommissionRate, CommissionRole, Tier};

use crate::error::BillingError;

const fn pct(percent: u8) -> CommissionRate {
    match CommissionRate::new(percent) {
        Some(rate) => rate,
        None => panic!("commission rate above 100%"),
    }
}

/// Rows in `Tier::ALL` order, columns in `CommissionRole::ALL` order
const TABLE: [[CommissionRate; 4]; 3] = [
    [pct(20), pct(20), pct(10), pct(5)],
    [pct(25), pct(25), pct(12), pct(7)],
    [pct(30), pct(30), pct(15), pct(10)],
];

const fn role_column(role: CommissionRole) -> usize {
    match role {
        CommissionRole::CandidateRecruiter => 0,
        CommissionRole::JobOwner => 1,
        CommissionRole::CompanyRecruiter => 2,
        CommissionRole::Sourcer => 3,
    }
}

/// Rate a participant of `tier` earns in `role`
pub const fn rate_for(tier: Tier, role: CommissionRole) -> CommissionRate {
    TABLE[tier.rank() as usize][role_column(role)]
}

/// Look up a rate from slugs, rejecting anything outside the closed sets
pub fn rate_for_slugs(tier: &str, role: &str) -> Result<CommissionRate, BillingError> {
    let tier: Tier = tier.parse()?;
    let role: CommissionRole = role.parse()?;
    Ok(rate_for(tier, role))
}

/// One tier's rates, for comparison displays
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateRow {
    /// Tier
    pub tier: Tier,
    /// Rate per role, in role order
    pub rates: Vec<(CommissionRole, CommissionRate)>,
}

/// The whole table, lowest tier first
pub fn rate_table() -> Vec<RateRow> {
    Tier::ALL
        .iter()
        .map(|&tier| RateRow {
            tier,
            rates: CommissionRole::ALL
                .iter()
                .map(|&role| (role, rate_for(tier, role)))
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_table_values() {
        assert_eq!(rate_for(Tier::Free, CommissionRole::CandidateRecruiter).percent(), 20);
        assert_eq!(rate_for(Tier::Free, CommissionRole::Sourcer).percent(), 5);
        assert_eq!(rate_for(Tier::Pro, CommissionRole::CompanyRecruiter).percent(), 12);
        assert_eq!(rate_for(Tier::Partner, CommissionRole::JobOwner).percent(), 30);
        assert_eq!(rate_for(Tier::Partner, CommissionRole::Sourcer).percent(), 10);
    }

    #[test]
    fn test_slugs_never_default() {
        assert_eq!(rate_for_slugs("pro", "sourcer").unwrap().percent(), 7);
        assert!(matches!(
            rate_for_slugs("gold", "sourcer"),
            Err(BillingError::InvalidTier(_))
        ));
        assert!(matches!(
            rate_for_slugs("pro", "closer"),
            Err(BillingError::InvalidRole(_))
        ));
        assert!(rate_for_slugs("", "").is_err());
    }

    #[test]
    fn test_rate_table_covers_every_pair() {
        let table = rate_table();
        assert_eq!(table.len(), Tier::ALL.len());
        for row in &table {
            assert_eq!(row.rates.len(), CommissionRole::ALL.len());
            for (role, rate) in &row.rates {
                assert_eq!(*rate, rate_for(row.tier, *role));
            }
        }
    }

    fn tier_strategy() -> impl Strategy<Value = Tier> {
        prop::sample::select(Tier::ALL.to_vec())
    }

    fn role_strategy() -> impl Strategy<Value = CommissionRole> {
        prop::sample::select(CommissionRole::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_rates_monotonic_in_tier(a in tier_strategy(), b in tier_strategy(), role in role_strategy()) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(rate_for(high, role) >= rate_for(low, role));
        }

        #[test]
        fn prop_slug_lookup_matches_typed_lookup(tier in tier_strategy(), role in role_strategy()) {
            prop_assert_eq!(
                rate_for_slugs(tier.as_str(), role.as_str()).unwrap(),
                rate_for(tier, role)
            );
        }

        #[test]
        fn prop_unknown_tier_slugs_rejected(slug in "[a-z]{1,12}", role in role_strategy()) {
            prop_assume!(slug.parse::<Tier>().is_err());
            prop_assert!(rate_for_slugs(&slug, role.as_str()).is_err());
        }
    }
}
