//! `mealsub-scheduler`: the delivery scheduling and pause/skip engine.
//!
//! # Overview
//!
//! An order moved to the kitchen is expanded into weekday deliveries by the
//! [`generator`]. Customers then file PAUSE, SKIP and WITHDRAW_PAUSE requests
//! (checked by [`policy`]); an admin decision runs the schedule effects in
//! [`approval`]. Listings are rendered by [`projection`].
//!
//! Pausing or skipping defers servings, it never drops them:
//!
//! | Approved request | Schedule effect                                        |
//! |------------------|--------------------------------------------------------|
//! | `PAUSE`          | PENDING days in the window removed, same count appended |
//! | `SKIP`           | delivery marked SKIPPED, one serving appended          |
//! | `WITHDRAW_PAUSE` | appended servings pulled back into the freed days      |
//!
//! [`SchedulerHandle`] wraps all of it behind one shared SQLite connection.

pub mod approval;
pub mod db;
pub mod engine;
pub mod error;
pub mod generator;
pub mod policy;
pub mod projection;
pub mod types;

pub use engine::SchedulerHandle;
pub use error::{Result, SchedulerError};
pub use types::{
    ActivationReport, AdminRequestView, PauseInput, SubscriptionFilter, SubscriptionState,
    SubscriptionView,
};
