pub mod auth;
pub mod push_subscriptions;
