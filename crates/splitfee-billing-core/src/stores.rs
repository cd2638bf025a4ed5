//! Repository handles shared by the billing components

use std::sync::Arc;

use splitfee_db::{
    CommissionRepository, PayoutRepository, PlanRepository, Repositories, SubscriptionRepository,
};

/// The stores the engine reads and writes
#[derive(Clone)]
pub struct Stores {
    pub plans: Arc<dyn PlanRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub commissions: Arc<dyn CommissionRepository>,
    pub payouts: Arc<dyn PayoutRepository>,
}

impl From<Repositories> for Stores {
    fn from(repos: Repositories) -> Self {
        Self {
            plans: Arc::new(repos.plans),
            subscriptions: Arc::new(repos.subscriptions),
            commissions: Arc::new(repos.commissions),
            payouts: Arc::new(repos.payouts),
        }
    }
}
