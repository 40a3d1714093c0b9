//! `mealsub-orders`: the slice of order data the scheduling engine reads.
//!
//! Orders, their lines, the `subscriptions` rows owned by DB-backed kinds
//! (`customMeal`, `addon`) and customer contact details. Everything here is
//! plain functions over a borrowed `rusqlite::Connection`; the caller owns
//! locking and transactions.

pub mod customers;
pub mod db;
pub mod error;
pub mod orders;
pub mod subscriptions;
pub mod types;

pub use error::{OrderError, Result};
pub use types::{
    Customer, NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, PauseStamp, PaymentStatus,
    SubscriptionRecord, SubscriptionStatus,
};
