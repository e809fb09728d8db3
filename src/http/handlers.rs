use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::push_subscriptions::{PushSubscriptionService, SubscriptionStats};
use crate::domain::push_subscription::{
    endpoint_fingerprint, required_endpoint, NewPushSubscription, PushSubscription,
};
use crate::http::{AdminToken, AppError, AuthUser, Envelope};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = match state.store.ping().await {
        Ok(()) => "ok",
        Err(err) => {
            tracing::warn!(error = ?err, "store ping failed");
            "degraded"
        }
    };

    Json(HealthResponse { status })
}

const INVALID_SUBSCRIPTION: &str = "Invalid subscription data";

#[derive(Deserialize)]
pub struct SubscribeRequest {
    pub endpoint: Option<String>,
    pub keys: Option<SubscriptionKeys>,
}

#[derive(Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: Option<String>,
    pub auth: Option<String>,
}

#[derive(Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: Option<String>,
}

// `auth` comes first so an unauthenticated call is rejected before the body is
// read or validated.
pub async fn subscribe(
    auth: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Json<Envelope>, AppError> {
    let Json(payload) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, user_id = %auth.user_id, "unreadable subscribe body");
        AppError::bad_request(INVALID_SUBSCRIPTION)
    })?;

    let (p256dh, auth_secret) = payload
        .keys
        .map(|keys| (keys.p256dh, keys.auth))
        .unwrap_or_default();
    let subscription =
        NewPushSubscription::new(payload.endpoint, p256dh, auth_secret).map_err(|err| {
            tracing::debug!(reason = %err, user_id = %auth.user_id, "invalid subscribe body");
            AppError::bad_request(INVALID_SUBSCRIPTION)
        })?;

    let service = PushSubscriptionService::new(state.store.clone());
    service
        .subscribe(auth.user_id, &subscription)
        .await
        .map_err(|err| {
            tracing::error!(
                error = ?err,
                user_id = %auth.user_id,
                endpoint = %endpoint_fingerprint(subscription.endpoint()),
                "failed to save push subscription"
            );
            AppError::internal("Failed to save subscription")
        })?;

    Ok(Json(Envelope {
        success: true,
        message: "Push subscription saved",
    }))
}

pub async fn unsubscribe(
    auth: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<UnsubscribeRequest>, JsonRejection>,
) -> Result<Json<Envelope>, AppError> {
    let endpoint = payload
        .ok()
        .and_then(|Json(payload)| required_endpoint(payload.endpoint).ok())
        .ok_or_else(|| AppError::bad_request("Endpoint required"))?;

    let service = PushSubscriptionService::new(state.store.clone());
    service
        .unsubscribe(auth.user_id, &endpoint)
        .await
        .map_err(|err| {
            tracing::error!(
                error = ?err,
                user_id = %auth.user_id,
                endpoint = %endpoint_fingerprint(&endpoint),
                "failed to delete push subscription"
            );
            AppError::internal("Failed to unsubscribe")
        })?;

    Ok(Json(Envelope {
        success: true,
        message: "Unsubscribed from push notifications",
    }))
}

#[derive(Serialize)]
pub struct SubscriptionView {
    pub id: Uuid,
    pub endpoint: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<PushSubscription> for SubscriptionView {
    fn from(subscription: PushSubscription) -> Self {
        Self {
            id: subscription.id,
            endpoint: subscription.endpoint,
            created_at: subscription.created_at,
            updated_at: subscription.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct SubscriptionListResponse {
    pub success: bool,
    pub subscriptions: Vec<SubscriptionView>,
}

pub async fn list_subscriptions(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<SubscriptionListResponse>, AppError> {
    let service = PushSubscriptionService::new(state.store.clone());
    let subscriptions = service.list(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list push subscriptions");
        AppError::internal("Failed to load subscriptions")
    })?;

    Ok(Json(SubscriptionListResponse {
        success: true,
        subscriptions: subscriptions.into_iter().map(SubscriptionView::from).collect(),
    }))
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub stats: SubscriptionStats,
}

pub async fn subscription_stats(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, AppError> {
    let service = PushSubscriptionService::new(state.store.clone());
    let stats = service.stats().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to load push subscription stats");
        AppError::internal("Failed to load subscription stats")
    })?;

    Ok(Json(StatsResponse {
        success: true,
        stats,
    }))
}
