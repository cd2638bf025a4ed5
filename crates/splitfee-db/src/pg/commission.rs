//! PostgreSQL commission snapshot repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::{CommissionSnapshotRow, SubscriptionRow};
use crate::pg::lock_user;
use crate::repo::{CommissionRepository, CreateSnapshot};

/// PostgreSQL commission snapshot repository
#[derive(Clone)]
pub struct PgCommissionRepository {
    pool: PgPool,
}

impl PgCommissionRepository {
    /// Create a new commission snapshot repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommissionRepository for PgCommissionRepository {
    async fn create(&self, snapshot: CreateSnapshot) -> DbResult<Vec<CommissionSnapshotRow>> {
        let mut tx = self.pool.begin().await?;

        // Lock in a stable order so two hires sharing participants cannot deadlock
        let mut guards = snapshot.guards.clone();
        guards.sort_by_key(|g| g.user_id);
        guards.dedup_by_key(|g| g.user_id);

        for guard in &guards {
            lock_user(&mut tx, guard.user_id).await?;

            let current = sqlx::query_as::<_, SubscriptionRow>(
                r#"
                SELECT id, user_id, plan_id, status, current_period_start, current_period_end,
                       cancel_at, stripe_subscription_id, stripe_customer_id, last_event_at,
                       version, created_at, updated_at
                FROM subscriptions
                WHERE user_id = $1
                ORDER BY created_at DESC
                LIMIT 1
                "#,
            )
            .bind(guard.user_id)
            .fetch_optional(&mut *tx)
            .await?;

            if !guard.matches(current.as_ref()) {
                warn!(
                    placement_id = %snapshot.placement_id,
                    user_id = %guard.user_id,
                    "Plan changed while the snapshot was being resolved"
                );
                return Err(DbError::VersionConflict(format!(
                    "subscription of user {} changed during resolution",
                    guard.user_id
                )));
            }
        }

        let mut rows = Vec::with_capacity(snapshot.entries.len());
        for entry in &snapshot.entries {
            let row = sqlx::query_as::<_, CommissionSnapshotRow>(
                r#"
                INSERT INTO commission_snapshots (placement_id, role, user_id, tier,
                                                  rate_percent, resolved_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING placement_id, role, user_id, tier, rate_percent, resolved_at
                "#,
            )
            .bind(snapshot.placement_id)
            .bind(&entry.role)
            .bind(entry.user_id)
            .bind(&entry.tier)
            .bind(entry.rate_percent)
            .bind(snapshot.resolved_at)
            .fetch_one(&mut *tx)
            .await?;
            rows.push(row);
        }

        tx.commit().await?;
        Ok(rows)
    }

    async fn find_by_placement(&self, placement_id: Uuid) -> DbResult<Vec<CommissionSnapshotRow>> {
        let rows = sqlx::query_as::<_, CommissionSnapshotRow>(
            r#"
            SELECT placement_id, role, user_id, tier, rate_percent, resolved_at
            FROM commission_snapshots
            WHERE placement_id = $1
            "#,
        )
        .bind(placement_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
