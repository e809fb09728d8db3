use anyhow::Result;
use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::app::push_subscriptions::{SubscriptionStats, SubscriptionStore, UpsertOutcome};
use crate::domain::push_subscription::{NewPushSubscription, PushSubscription};
use crate::infra::db::Db;

/// `SubscriptionStore` backed by the `push_subscriptions` table.
#[derive(Clone)]
pub struct PgSubscriptionStore {
    db: Db,
}

impl PgSubscriptionStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn upsert(
        &self,
        user_id: Uuid,
        subscription: &NewPushSubscription,
    ) -> Result<UpsertOutcome> {
        // xmax is 0 only for a freshly inserted tuple.
        let row = sqlx::query(
            "INSERT INTO push_subscriptions (user_id, endpoint, p256dh, auth) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, endpoint) DO UPDATE \
             SET p256dh = EXCLUDED.p256dh, \
                 auth = EXCLUDED.auth, \
                 updated_at = clock_timestamp() \
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(user_id)
        .bind(subscription.endpoint())
        .bind(subscription.p256dh())
        .bind(subscription.auth())
        .fetch_one(self.db.pool())
        .await?;

        let inserted: bool = row.get("inserted");
        Ok(if inserted {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        })
    }

    async fn delete(&self, user_id: Uuid, endpoint: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM push_subscriptions \
             WHERE user_id = $1 AND endpoint = $2",
        )
        .bind(user_id)
        .bind(endpoint)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<PushSubscription>> {
        let rows = sqlx::query(
            "SELECT id, user_id, endpoint, p256dh, auth, created_at, updated_at \
             FROM push_subscriptions \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut subscriptions = Vec::with_capacity(rows.len());
        for row in rows {
            subscriptions.push(PushSubscription {
                id: row.get("id"),
                user_id: row.get("user_id"),
                endpoint: row.get("endpoint"),
                p256dh: row.get("p256dh"),
                auth: row.get("auth"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            });
        }

        Ok(subscriptions)
    }

    async fn stats(&self) -> Result<SubscriptionStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total_subscriptions, \
                    COUNT(DISTINCT user_id) AS subscribed_users \
             FROM push_subscriptions",
        )
        .fetch_one(self.db.pool())
        .await?;

        Ok(SubscriptionStats {
            total_subscriptions: row.get("total_subscriptions"),
            subscribed_users: row.get("subscribed_users"),
        })
    }

    async fn ping(&self) -> Result<()> {
        self.db.ping().await
    }
}
