//! `mealsub-core`: shared types, configuration and the pure calendar math
//! used by every other crate in the workspace.
//!
//! Nothing in this crate opens a database or reads the wall clock: callers
//! pass "today" (and "now" where a time of day matters) explicitly.
//!
//! | Module     | Contents                                              |
//! |------------|-------------------------------------------------------|
//! | `calendar` | ISO date parsing, weekday tests, cutoff comparisons   |
//! | `cycle`    | Plan periods, cycle start / extended cycle end        |
//! | `progress` | Per-cycle servings progress from delivery history     |
//! | `config`   | `mealsub.toml` + `MEALSUB_*` env configuration        |
//! | `types`    | Plans, subscription kinds, roles, mutation outcomes   |
//! | `sql`      | Row-mapping helpers for the SQLite-backed crates      |

pub mod calendar;
pub mod config;
pub mod cycle;
pub mod error;
pub mod progress;
pub mod sql;
pub mod types;

pub use error::{CoreError, Result};
pub use types::{Mutation, Plan, SubscriptionKind, UserRole};
