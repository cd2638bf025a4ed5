//! Plan catalog
//!
//! Read-only view over the plans table. Rows are decoded and validated on
//! every read; the store's ordering is never trusted.

use std::sync::Arc;

use tracing::{instrument, warn};

use splitfee_db::{PlanRepository, PlanRow};
use splitfee_types::{Plan, PlanFeatures, PlanId, PlanTier, PriceId, ProductId, Tier};

use crate::error::BillingError;

/// Validated access to the plan catalog
#[derive(Clone)]
pub struct PlanCatalog {
    plans: Arc<dyn PlanRepository>,
}

impl PlanCatalog {
    /// Create a catalog over a plan store
    pub fn new(plans: Arc<dyn PlanRepository>) -> Self {
        Self { plans }
    }

    /// Active plans, lowest tier first; unrecognized tiers last, by slug
    #[instrument(skip(self))]
    pub async fn list_active_plans(&self) -> Result<Vec<Plan>, BillingError> {
        let rows = self.plans.list_all().await?;

        let mut plans = rows
            .into_iter()
            .filter(|row| row.is_active)
            .map(decode_plan)
            .collect::<Result<Vec<_>, _>>()?;

        sort_plans(&mut plans);
        Ok(plans)
    }

    /// A plan by ID, active or not
    #[instrument(skip(self))]
    pub async fn get_plan(&self, id: PlanId) -> Result<Plan, BillingError> {
        let row = self
            .plans
            .find_by_id(id.0)
            .await?
            .ok_or_else(|| BillingError::PlanNotFound(id.to_string()))?;

        decode_plan(row)
    }

    /// The plan a processor price belongs to
    #[instrument(skip(self))]
    pub async fn find_by_price_id(&self, price_id: &PriceId) -> Result<Plan, BillingError> {
        let row = self
            .plans
            .find_by_stripe_price_id(&price_id.0)
            .await?
            .ok_or_else(|| {
                warn!(price_id = %price_id, "No plan for processor price");
                BillingError::PlanNotFound(price_id.to_string())
            })?;

        decode_plan(row)
    }

    /// The active free plan behind virtual and lapsed subscriptions
    pub async fn free_plan(&self) -> Result<Plan, BillingError> {
        let rows = self.plans.list_all().await?;

        let mut free: Vec<PlanRow> = rows
            .into_iter()
            .filter(|row| row.is_active && row.tier == Tier::Free.as_str())
            .collect();

        if free.len() > 1 {
            warn!(count = free.len(), "Catalog has more than one active free plan");
        }
        // Oldest wins
        free.sort_by_key(|row| (row.created_at, row.id));

        let row = free.into_iter().next().ok_or_else(|| BillingError::MalformedPlan {
            plan: Tier::Free.as_str().to_string(),
            reason: "catalog has no active free plan".to_string(),
        })?;

        decode_plan(row)
    }
}

/// Order plans for display
pub fn sort_plans(plans: &mut [Plan]) {
    plans.sort_by(|a, b| {
        a.tier
            .sort_key()
            .cmp(&b.tier.sort_key())
            .then_with(|| a.monthly_price_cents.cmp(&b.monthly_price_cents))
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Decode a stored plan, rejecting rows the engine cannot honor
pub fn decode_plan(row: PlanRow) -> Result<Plan, BillingError> {
    let malformed = |reason: String| BillingError::MalformedPlan {
        plan: row.id.to_string(),
        reason,
    };

    if row.monthly_price_cents < 0 {
        return Err(malformed(format!(
            "negative price {}",
            row.monthly_price_cents
        )));
    }

    let features =
        PlanFeatures::from_json(row.features.clone()).map_err(|e| malformed(e.to_string()))?;

    if row.monthly_price_cents > 0 && row.stripe_price_id.is_none() {
        return Err(malformed("paid plan without a processor price".to_string()));
    }

    let tier = PlanTier::from_slug(&row.tier);
    if let PlanTier::Unrecognized(slug) = &tier {
        warn!(plan_id = %row.id, tier = %slug, "Plan has an unrecognized tier");
    }

    Ok(Plan {
        id: PlanId(row.id),
        tier,
        name: row.name,
        monthly_price_cents: row.monthly_price_cents,
        features,
        stripe_product_id: row.stripe_product_id.map(ProductId),
        stripe_price_id: row.stripe_price_id.map(PriceId),
        is_active: row.is_active,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use splitfee_types::ApplicationLimit;
    use uuid::Uuid;

    fn row(tier: &str, price: i64, features: serde_json::Value) -> PlanRow {
        PlanRow {
            id: Uuid::new_v4(),
            tier: tier.to_string(),
            name: format!("{tier} plan"),
            monthly_price_cents: price,
            features,
            stripe_product_id: (price > 0).then(|| "prod_1".to_string()),
            stripe_price_id: (price > 0).then(|| format!("price_{tier}")),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn features() -> serde_json::Value {
        json!({ "version": 1, "applications_per_month": 10 })
    }

    #[test]
    fn test_decode_valid_plan() {
        let plan = decode_plan(row("pro", 4900, features())).unwrap();
        assert_eq!(plan.tier, PlanTier::Known(Tier::Pro));
        assert!(plan.is_paid());
        assert_eq!(
            plan.features.applications_per_month,
            ApplicationLimit::Limited(10)
        );
    }

    #[test]
    fn test_decode_rejects_unknown_feature_keys() {
        let err = decode_plan(row(
            "pro",
            4900,
            json!({ "version": 1, "applications_per_month": 10, "teleport": true }),
        ))
        .unwrap_err();
        assert!(matches!(err, BillingError::MalformedPlan { .. }));
    }

    #[test]
    fn test_decode_rejects_future_feature_version() {
        let err = decode_plan(row(
            "pro",
            4900,
            json!({ "version": 2, "applications_per_month": 10 }),
        ))
        .unwrap_err();
        assert!(matches!(err, BillingError::MalformedPlan { .. }));
    }

    #[test]
    fn test_decode_rejects_paid_plan_without_price() {
        let mut paid = row("pro", 4900, features());
        paid.stripe_price_id = None;
        assert!(decode_plan(paid).is_err());
    }

    #[test]
    fn test_decode_keeps_unrecognized_tier() {
        let plan = decode_plan(row("enterprise", 99900, features())).unwrap();
        assert_eq!(plan.tier.slug(), "enterprise");
        assert!(plan.tier.tier().is_err());
    }

    #[test]
    fn test_sort_puts_unknown_tiers_last() {
        let mut plans: Vec<Plan> = [
            row("enterprise", 99900, features()),
            row("partner", 14900, features()),
            row("free", 0, features()),
            row("agency", 49900, features()),
            row("pro", 4900, features()),
        ]
        .into_iter()
        .map(|r| decode_plan(r).unwrap())
        .collect();

        sort_plans(&mut plans);
        let slugs: Vec<&str> = plans.iter().map(|p| p.tier.slug()).collect();
        assert_eq!(slugs, ["free", "pro", "partner", "agency", "enterprise"]);
    }
}
