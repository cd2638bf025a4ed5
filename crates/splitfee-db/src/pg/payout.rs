//! PostgreSQL payout repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::PayoutRow;
use crate::repo::{CreatePayout, PayoutRepository};

/// PostgreSQL payout repository
#[derive(Clone)]
pub struct PgPayoutRepository {
    pool: PgPool,
}

impl PgPayoutRepository {
    /// Create a new payout repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PayoutRepository for PgPayoutRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PayoutRow>> {
        let payout = sqlx::query_as::<_, PayoutRow>(
            r#"
            SELECT id, user_id, placement_id, role, amount_cents, currency, status,
                   scheduled_for, completed_at, created_at, updated_at
            FROM payouts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payout)
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> DbResult<Vec<PayoutRow>> {
        let payouts = sqlx::query_as::<_, PayoutRow>(
            r#"
            SELECT id, user_id, placement_id, role, amount_cents, currency, status,
                   scheduled_for, completed_at, created_at, updated_at
            FROM payouts
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payouts)
    }

    async fn create(&self, payout: CreatePayout) -> DbResult<PayoutRow> {
        let row = sqlx::query_as::<_, PayoutRow>(
            r#"
            INSERT INTO payouts (id, user_id, placement_id, role, amount_cents,
                                 currency, scheduled_for)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, placement_id, role, amount_cents, currency, status,
                      scheduled_for, completed_at, created_at, updated_at
            "#,
        )
        .bind(payout.id)
        .bind(payout.user_id)
        .bind(payout.placement_id)
        .bind(&payout.role)
        .bind(payout.amount_cents)
        .bind(&payout.currency)
        .bind(payout.scheduled_for)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: &str,
        to: &str,
        completed_at: Option<DateTime<Utc>>,
    ) -> DbResult<PayoutRow> {
        let updated = sqlx::query_as::<_, PayoutRow>(
            r#"
            UPDATE payouts
            SET status = $3, completed_at = COALESCE($4, completed_at), updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING id, user_id, placement_id, role, amount_cents, currency, status,
                      scheduled_for, completed_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(completed_at)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(row) => Ok(row),
            None if self.find_by_id(id).await?.is_some() => {
                debug!(payout_id = %id, from, to, "Payout status moved concurrently");
                Err(DbError::VersionConflict(format!(
                    "payout {id} is no longer {from}"
                )))
            }
            None => Err(DbError::NotFound),
        }
    }
}
