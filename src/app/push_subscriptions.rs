use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::push_subscription::{endpoint_fingerprint, NewPushSubscription, PushSubscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubscriptionStats {
    pub total_subscriptions: i64,
    pub subscribed_users: i64,
}

/// Persistence for push subscriptions, keyed by `(user_id, endpoint)`.
///
/// Implementations must make `upsert` atomic with respect to concurrent calls
/// for the same pair and must scope `delete` to the given user.
#[async_trait]
pub trait SubscriptionStore: Send + Sync + 'static {
    async fn upsert(
        &self,
        user_id: Uuid,
        subscription: &NewPushSubscription,
    ) -> Result<UpsertOutcome>;

    /// Returns whether a row was removed.
    async fn delete(&self, user_id: Uuid, endpoint: &str) -> Result<bool>;

    /// Newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<PushSubscription>>;

    async fn stats(&self) -> Result<SubscriptionStats>;

    async fn ping(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct PushSubscriptionService {
    store: Arc<dyn SubscriptionStore>,
}

impl PushSubscriptionService {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    pub async fn subscribe(
        &self,
        user_id: Uuid,
        subscription: &NewPushSubscription,
    ) -> Result<UpsertOutcome> {
        let outcome = self.store.upsert(user_id, subscription).await?;
        match outcome {
            UpsertOutcome::Created => tracing::info!(
                user_id = %user_id,
                endpoint = %endpoint_fingerprint(subscription.endpoint()),
                "push subscription created"
            ),
            UpsertOutcome::Updated => tracing::debug!(
                user_id = %user_id,
                endpoint = %endpoint_fingerprint(subscription.endpoint()),
                "push subscription keys refreshed"
            ),
        }
        Ok(outcome)
    }

    pub async fn unsubscribe(&self, user_id: Uuid, endpoint: &str) -> Result<bool> {
        let removed = self.store.delete(user_id, endpoint).await?;
        tracing::info!(
            user_id = %user_id,
            endpoint = %endpoint_fingerprint(endpoint),
            removed,
            "push unsubscribe"
        );
        Ok(removed)
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<PushSubscription>> {
        self.store.list_for_user(user_id).await
    }

    pub async fn stats(&self) -> Result<SubscriptionStats> {
        self.store.stats().await
    }
}
