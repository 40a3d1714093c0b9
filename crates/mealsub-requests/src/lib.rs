//! `mealsub-requests`: the pause / skip request log.
//!
//! Requests are append-only rows in `pause_skip_requests`. A request leaves
//! PENDING exactly once: an admin decision (APPROVED / DECLINED) or the
//! owner's withdrawal (WITHDRAWN). Both are conditional updates, so two
//! racing deciders get one `Applied` and one `Conflict`.
//!
//! [`pause`] derives the effective pause windows of a subscription from the
//! approved PAUSE requests and any approved WITHDRAW_PAUSE linked to them.

pub mod db;
pub mod error;
pub mod pause;
pub mod store;
pub mod types;

pub use error::{RequestError, Result};
pub use pause::{PauseWindow, PauseWindows};
pub use types::{
    Decision, NewRequest, PauseSkipRequest, RequestFilter, RequestKind, RequestStatus,
    RequestType,
};
