//! `mealsub-deliveries`: the persisted delivery schedule.
//!
//! One `deliveries` row per (user, subscription, calendar date). The derived
//! `group_key` column carries a UNIQUE constraint, which turns racing inserts
//! into [`InsertOutcome::Duplicate`] instead of a second row. Status changes
//! are conditional on the current status so a kitchen update and a skip
//! approval can never both win.

pub mod db;
pub mod error;
pub mod meta;
pub mod store;
pub mod types;

pub use error::{DeliveryError, Result};
pub use meta::{schedule_meta, ScheduleMeta};
pub use types::{
    group_key, Delivery, DeliveryItem, DeliveryStatus, InsertOutcome, NewDelivery, StatusChange,
};
