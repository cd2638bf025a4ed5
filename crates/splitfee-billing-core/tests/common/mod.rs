//! Common test utilities

pub mod mock_provider;
pub mod mock_repos;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use splitfee_billing_core::{
    BillingConfig, BillingEvent, BillingEventKind, BillingOrchestrator, PlanRef, Stores,
};
use splitfee_types::{CustomerId, PlanId, PriceId, SubscriptionStatus, UserId};

#[allow(unused_imports)]
pub use mock_provider::MockPaymentProvider;
#[allow(unused_imports)]
pub use mock_repos::{
    MockCommissionRepository, MockPayoutRepository, MockPlanRepository,
    MockSubscriptionRepository,
};

/// Orchestrator over in-memory stores seeded with a free, pro and partner plan
#[allow(dead_code)]
pub struct TestBilling {
    pub billing: BillingOrchestrator,
    pub plans: MockPlanRepository,
    pub subscriptions: MockSubscriptionRepository,
    pub commissions: MockCommissionRepository,
    pub payouts: MockPayoutRepository,
    pub provider: MockPaymentProvider,
    pub free: PlanId,
    pub pro: PlanId,
    pub partner: PlanId,
}

#[allow(dead_code)]
impl TestBilling {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: BillingConfig) -> Self {
        let plans = MockPlanRepository::new();
        let free = MockPlanRepository::plan_row("free", 0);
        let pro = MockPlanRepository::plan_row("pro", 4_900);
        let partner = MockPlanRepository::plan_row("partner", 14_900);
        let (free_id, pro_id, partner_id) = (PlanId(free.id), PlanId(pro.id), PlanId(partner.id));
        plans.insert_plan(free);
        plans.insert_plan(pro);
        plans.insert_plan(partner);

        let subscriptions = MockSubscriptionRepository::new();
        let commissions = MockCommissionRepository::new(subscriptions.clone());
        let payouts = MockPayoutRepository::new();
        let provider = MockPaymentProvider::new();

        let stores = Stores {
            plans: Arc::new(plans.clone()),
            subscriptions: Arc::new(subscriptions.clone()),
            commissions: Arc::new(commissions.clone()),
            payouts: Arc::new(payouts.clone()),
        };
        let billing = BillingOrchestrator::new(stores, Arc::new(provider.clone()), config);

        Self {
            billing,
            plans,
            subscriptions,
            commissions,
            payouts,
            provider,
            free: free_id,
            pro: pro_id,
            partner: partner_id,
        }
    }

    /// Put a user on a paid plan through a completed checkout
    pub async fn subscribe(&self, user_id: UserId, plan_id: PlanId, stripe_id: &str) {
        let event = checkout_completed(
            &format!("evt_checkout_{stripe_id}"),
            user_id,
            plan_id,
            stripe_id,
            Utc::now(),
        );
        self.billing
            .subscriptions()
            .apply_event(&event)
            .await
            .expect("checkout should apply");
    }
}

#[allow(dead_code)]
pub fn test_config() -> BillingConfig {
    BillingConfig::new("sk_test_123", "whsec_test_secret")
        .with_urls("https://app.example.com/billing/success", "https://app.example.com/billing")
}

#[allow(dead_code)]
pub fn checkout_completed(
    event_id: &str,
    user_id: UserId,
    plan_id: PlanId,
    stripe_id: &str,
    occurred_at: DateTime<Utc>,
) -> BillingEvent {
    BillingEvent {
        id: event_id.to_string(),
        occurred_at,
        kind: BillingEventKind::CheckoutCompleted {
            user_id,
            plan: PlanRef::Id(plan_id),
            stripe_subscription_id: Some(stripe_id.to_string()),
            stripe_customer_id: Some(CustomerId::new(format!("cus_{stripe_id}"))),
        },
    }
}

#[allow(dead_code)]
pub fn status_changed(
    event_id: &str,
    stripe_id: &str,
    status: SubscriptionStatus,
    price: Option<&str>,
    occurred_at: DateTime<Utc>,
) -> BillingEvent {
    BillingEvent {
        id: event_id.to_string(),
        occurred_at,
        kind: BillingEventKind::StatusChanged {
            stripe_subscription_id: stripe_id.to_string(),
            stripe_customer_id: Some(CustomerId::new(format!("cus_{stripe_id}"))),
            user_id: None,
            status,
            plan: price.map(|p| PlanRef::Price(PriceId::new(p))),
            period_start: None,
            period_end: None,
            cancel_at: None,
        },
    }
}

/// Attach owner metadata to a processor event
#[allow(dead_code)]
pub fn with_owner(mut event: BillingEvent, owner: UserId) -> BillingEvent {
    if let BillingEventKind::StatusChanged { user_id, .. } = &mut event.kind {
        *user_id = Some(owner);
    }
    event
}
