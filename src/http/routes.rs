use axum::{routing::get, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn push() -> Router<AppState> {
    Router::new()
        .route(
            "/api/push/subscribe",
            post(handlers::subscribe).delete(handlers::unsubscribe),
        )
        .route("/api/push/subscriptions", get(handlers::list_subscriptions))
}

pub fn admin() -> Router<AppState> {
    Router::new().route("/api/admin/push/stats", get(handlers::subscription_stats))
}
