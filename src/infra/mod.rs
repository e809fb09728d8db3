pub mod db;
pub mod subscriptions;
