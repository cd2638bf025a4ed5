//! PostgreSQL repository implementations

mod commission;
mod payout;
mod plan;
mod subscription;

pub use commission::PgCommissionRepository;
pub use payout::PgPayoutRepository;
pub use plan::PgPlanRepository;
pub use subscription::PgSubscriptionRepository;

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::DbResult;
use crate::DbPool;

/// All repositories bundled together
#[derive(Clone)]
pub struct Repositories {
    pub plans: PgPlanRepository,
    pub subscriptions: PgSubscriptionRepository,
    pub commissions: PgCommissionRepository,
    pub payouts: PgPayoutRepository,
}

impl Repositories {
    /// Create all repositories from a database pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            plans: PgPlanRepository::new(pool.clone()),
            subscriptions: PgSubscriptionRepository::new(pool.clone()),
            commissions: PgCommissionRepository::new(pool.clone()),
            payouts: PgPayoutRepository::new(pool),
        }
    }
}

/// Serialize billing writes for one user until the transaction ends.
///
/// Subscription writes and snapshot inserts both take this lock, so a plan
/// change can never interleave with the version check of a hire.
pub(crate) async fn lock_user(conn: &mut PgConnection, user_id: Uuid) -> DbResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
        .bind(user_id)
        .execute(conn)
        .await?;

    Ok(())
}
