//! PostgreSQL subscription repository implementation

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::SubscriptionRow;
use crate::pg::lock_user;
use crate::repo::{CreateSubscription, SubscriptionRepository, UpdateSubscription};

const SUBSCRIPTION_COLUMNS: &str = r#"
    id, user_id, plan_id, status, current_period_start, current_period_end,
    cancel_at, stripe_subscription_id, stripe_customer_id, last_event_at,
    version, created_at, updated_at
"#;

/// PostgreSQL subscription repository
#[derive(Clone)]
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    /// Create a new subscription repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Insert an idempotency token; `Duplicate` if it was already recorded
async fn insert_event(conn: &mut PgConnection, event_id: &str) -> DbResult<()> {
    let inserted = sqlx::query(
        "INSERT INTO processed_events (event_id) VALUES ($1) ON CONFLICT (event_id) DO NOTHING",
    )
    .bind(event_id)
    .execute(conn)
    .await?
    .rows_affected();

    if inserted == 0 {
        debug!(event_id, "Event token already recorded");
        return Err(DbError::Duplicate(format!("event {event_id}")));
    }

    Ok(())
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<SubscriptionRow>> {
        let sub = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sub)
    }

    async fn find_current_by_user_id(&self, user_id: Uuid) -> DbResult<Option<SubscriptionRow>> {
        let sub = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"
            SELECT {SUBSCRIPTION_COLUMNS}
            FROM subscriptions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sub)
    }

    async fn find_by_stripe_id(&self, stripe_id: &str) -> DbResult<Option<SubscriptionRow>> {
        let sub = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE stripe_subscription_id = $1"
        ))
        .bind(stripe_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sub)
    }

    async fn create(&self, sub: CreateSubscription) -> DbResult<SubscriptionRow> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, sub.user_id).await?;

        let current = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"
            SELECT {SUBSCRIPTION_COLUMNS}
            FROM subscriptions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(sub.user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if !sub.guard.matches(current.as_ref()) {
            warn!(
                user_id = %sub.user_id,
                expected_version = sub.guard.version,
                found_version = ?current.as_ref().map(|row| row.version),
                "Subscription changed before insert"
            );
            return Err(DbError::VersionConflict(format!(
                "subscription of user {} changed",
                sub.user_id
            )));
        }

        if let Some(event_id) = sub.event_id.as_deref() {
            insert_event(&mut tx, event_id).await?;
        }

        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"
            INSERT INTO subscriptions (id, user_id, plan_id, status, current_period_start,
                                       current_period_end, stripe_subscription_id,
                                       stripe_customer_id, last_event_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(sub.id)
        .bind(sub.user_id)
        .bind(sub.plan_id)
        .bind(&sub.status)
        .bind(sub.current_period_start)
        .bind(sub.current_period_end)
        .bind(&sub.stripe_subscription_id)
        .bind(&sub.stripe_customer_id)
        .bind(sub.last_event_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn update(&self, update: UpdateSubscription) -> DbResult<SubscriptionRow> {
        let mut tx = self.pool.begin().await?;

        let user_id: Uuid = sqlx::query_scalar("SELECT user_id FROM subscriptions WHERE id = $1")
            .bind(update.id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;
        lock_user(&mut tx, user_id).await?;

        if let Some(event_id) = update.event_id.as_deref() {
            insert_event(&mut tx, event_id).await?;
        }

        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"
            UPDATE subscriptions
            SET plan_id = $3,
                status = $4,
                current_period_start = $5,
                current_period_end = $6,
                cancel_at = $7,
                stripe_subscription_id = $8,
                stripe_customer_id = $9,
                last_event_at = $10,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(update.id)
        .bind(update.expected_version)
        .bind(update.plan_id)
        .bind(&update.status)
        .bind(update.current_period_start)
        .bind(update.current_period_end)
        .bind(update.cancel_at)
        .bind(&update.stripe_subscription_id)
        .bind(&update.stripe_customer_id)
        .bind(update.last_event_at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            warn!(
                subscription_id = %update.id,
                expected_version = update.expected_version,
                "Subscription version moved"
            );
            DbError::VersionConflict(format!(
                "subscription {} is no longer at version {}",
                update.id, update.expected_version
            ))
        })?;

        tx.commit().await?;
        Ok(row)
    }

    async fn has_processed_event(&self, event_id: &str) -> DbResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM processed_events WHERE event_id = $1)")
                .bind(event_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn record_event(&self, event_id: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_event(&mut conn, event_id).await
    }
}
