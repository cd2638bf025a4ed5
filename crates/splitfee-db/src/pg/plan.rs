//! PostgreSQL plan repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::PlanRow;
use crate::repo::PlanRepository;

/// PostgreSQL plan repository
#[derive(Clone)]
pub struct PgPlanRepository {
    pool: PgPool,
}

impl PgPlanRepository {
    /// Create a new plan repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanRepository for PgPlanRepository {
    async fn list_all(&self) -> DbResult<Vec<PlanRow>> {
        let plans = sqlx::query_as::<_, PlanRow>(
            r#"
            SELECT id, tier, name, monthly_price_cents, features, stripe_product_id,
                   stripe_price_id, is_active, created_at
            FROM plans
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(plans)
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PlanRow>> {
        let plan = sqlx::query_as::<_, PlanRow>(
            r#"
            SELECT id, tier, name, monthly_price_cents, features, stripe_product_id,
                   stripe_price_id, is_active, created_at
            FROM plans
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan)
    }

    async fn find_by_stripe_price_id(&self, price_id: &str) -> DbResult<Option<PlanRow>> {
        let plan = sqlx::query_as::<_, PlanRow>(
            r#"
            SELECT id, tier, name, monthly_price_cents, features, stripe_product_id,
                   stripe_price_id, is_active, created_at
            FROM plans
            WHERE stripe_price_id = $1
            "#,
        )
        .bind(price_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan)
    }
}
