use axum::extract::DefaultBodyLimit;
use axum::Router;
use serde::Serialize;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::{AdminToken, AuthUser};
pub use error::AppError;

/// Uniform body for the push routes, shared by success and failure paths.
#[derive(Debug, Serialize)]
pub struct Envelope<M = &'static str> {
    pub success: bool,
    pub message: M,
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.request_body_limit_bytes;

    Router::new()
        .merge(routes::health())
        .merge(routes::push())
        .merge(routes::admin())
        // Checked by the `Json` extractor, after `AuthUser` has run.
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
