//! Caller resolution.
//!
//! Authentication happens upstream. When auth mode is `token` the shared
//! bearer token must match; the resolved caller then arrives in the
//! `x-user-id` and `x-user-role` headers.

use axum::http::HeaderMap;
use mealsub_core::config::AuthMode;
use mealsub_core::UserRole;

use crate::app::AppState;
use crate::http::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub role: UserRole,
}

/// Resolve the caller, or 401.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Caller, ApiError> {
    if !check_auth(state, headers) {
        return Err(ApiError::unauthorized());
    }
    let user_id = header_str(headers, USER_ID_HEADER)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(ApiError::unauthorized)?;
    let role = match header_str(headers, USER_ROLE_HEADER) {
        Some("admin") => UserRole::Admin,
        Some("user") | None => UserRole::User,
        Some(other) => {
            return Err(ApiError::bad_request(format!("Unknown role '{other}'")));
        }
    };
    Ok(Caller {
        user_id: user_id.to_string(),
        role,
    })
}

/// Resolve the caller and require the admin role, or 401 / 403.
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<Caller, ApiError> {
    let caller = authenticate(state, headers)?;
    if !caller.role.is_admin() {
        return Err(ApiError::forbidden());
    }
    Ok(caller)
}

/// Returns true if the request carries the configured bearer token.
fn check_auth(state: &AppState, headers: &HeaderMap) -> bool {
    match &state.config.gateway.auth.mode {
        AuthMode::None => true,
        AuthMode::Token => {
            let expected = match &state.config.gateway.auth.token {
                Some(t) => t.as_str(),
                // token mode without a token value denies everything
                None => return false,
            };
            extract_bearer(headers)
                .map(|t| t == expected)
                .unwrap_or(false)
        }
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, "authorization").and_then(|v| v.strip_prefix("Bearer "))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
