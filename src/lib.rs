pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use std::sync::Arc;

use crate::app::auth::AuthVerifier;
use crate::app::push_subscriptions::SubscriptionStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SubscriptionStore>,
    pub verifier: Arc<dyn AuthVerifier>,
    pub admin_token: Option<String>,
    pub request_body_limit_bytes: usize,
}
