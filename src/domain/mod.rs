pub mod push_subscription;
