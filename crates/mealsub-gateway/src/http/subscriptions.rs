//! Customer-facing subscription endpoints.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use mealsub_requests::{PauseSkipRequest, RequestFilter, RequestStatus, RequestType};
use mealsub_scheduler::{PauseInput, SubscriptionView};
use serde::Deserialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::http::auth::authenticate;
use crate::http::error::ApiError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestListQuery {
    pub status: Option<String>,
    pub request_type: Option<String>,
}

impl RequestListQuery {
    /// Parse into a filter; empty values mean "no filter".
    pub fn into_filter(self) -> Result<RequestFilter, ApiError> {
        Ok(RequestFilter {
            status: non_empty(self.status)
                .map(|s| s.parse::<RequestStatus>())
                .transpose()?,
            request_type: non_empty(self.request_type)
                .map(|t| t.parse::<RequestType>())
                .transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawPauseBody {
    pub pause_request_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipBody {
    pub delivery_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// GET /subscriptions/requests?status=&requestType=
pub async fn list_my_requests(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<RequestListQuery>, QueryRejection>,
) -> Result<Json<Vec<PauseSkipRequest>>, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let Query(query) = query?;
    let rows = state
        .scheduler
        .my_requests(&caller.user_id, query.into_filter()?)?;
    Ok(Json(rows))
}

/// POST /subscriptions/pause-requests
pub async fn create_pause_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<PauseInput>, JsonRejection>,
) -> Result<(StatusCode, Json<PauseSkipRequest>), ApiError> {
    let caller = authenticate(&state, &headers)?;
    let Json(input) = body?;
    let request = state
        .scheduler
        .create_pause_request(&caller.user_id, input, state.now())?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// POST /subscriptions/withdraw-pause-requests
pub async fn create_withdraw_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<WithdrawPauseBody>, JsonRejection>,
) -> Result<(StatusCode, Json<PauseSkipRequest>), ApiError> {
    let caller = authenticate(&state, &headers)?;
    let Json(body) = body?;
    let request = state
        .scheduler
        .create_withdraw_request(&caller.user_id, &body.pause_request_id)?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// POST /subscriptions/skip-requests
pub async fn create_skip_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<SkipBody>, JsonRejection>,
) -> Result<(StatusCode, Json<PauseSkipRequest>), ApiError> {
    let caller = authenticate(&state, &headers)?;
    let Json(body) = body?;
    let request = state.scheduler.create_skip_request(
        &caller.user_id,
        &body.delivery_id,
        body.reason,
        state.now(),
    )?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// POST /subscriptions/requests/{request_id}/withdraw
pub async fn withdraw_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Result<Json<PauseSkipRequest>, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let request = state
        .scheduler
        .withdraw_request(&caller.user_id, &request_id)?;
    Ok(Json(request))
}

/// GET /subscriptions/mine
pub async fn my_subscriptions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<SubscriptionView>>, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let views = state
        .scheduler
        .my_subscriptions(&caller.user_id, state.today())?;
    Ok(Json(views))
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
