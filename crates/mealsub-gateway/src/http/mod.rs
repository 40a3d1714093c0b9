pub mod admin;
pub mod auth;
pub mod deliveries;
pub mod error;
pub mod health;
pub mod subscriptions;
