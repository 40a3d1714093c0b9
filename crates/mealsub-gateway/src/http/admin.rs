//! Admin endpoints: request queue and decisions, order activation,
//! subscription overview.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::HeaderMap,
    Json,
};
use mealsub_core::{Plan, SubscriptionKind};
use mealsub_requests::{Decision, PauseSkipRequest, RequestStatus};
use mealsub_scheduler::{
    ActivationReport, AdminRequestView, SubscriptionFilter, SubscriptionState, SubscriptionView,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::http::auth::require_admin;
use crate::http::error::ApiError;
use crate::http::subscriptions::{non_empty, RequestListQuery};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecideBody {
    pub status: String,
    #[serde(default)]
    pub admin_note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub frequency: Option<String>,
    pub status: Option<String>,
}

/// GET /admin/pause-skip/requests?status=PENDING
///
/// Without a `status` parameter only PENDING requests are listed.
pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<RequestListQuery>, QueryRejection>,
) -> Result<Json<Vec<AdminRequestView>>, ApiError> {
    require_admin(&state, &headers)?;
    let Query(query) = query?;
    let no_status = query.status.is_none();
    let mut filter = query.into_filter()?;
    if no_status {
        filter.status = Some(RequestStatus::Pending);
    }
    Ok(Json(state.scheduler.admin_requests(filter)?))
}

/// POST /admin/pause-skip/requests/{request_id}/decide
pub async fn decide_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
    body: Result<Json<DecideBody>, JsonRejection>,
) -> Result<Json<PauseSkipRequest>, ApiError> {
    let caller = require_admin(&state, &headers)?;
    let Json(body) = body?;
    let decision: Decision = body.status.parse()?;
    let request = state.scheduler.decide_request(
        &request_id,
        decision,
        &caller.user_id,
        body.admin_note.as_deref(),
        state.today(),
    )?;
    Ok(Json(request))
}

/// POST /admin/orders/{order_id}/move-to-kitchen
pub async fn move_to_kitchen(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
) -> Result<Json<ActivationReport>, ApiError> {
    let caller = require_admin(&state, &headers)?;
    let report = state
        .scheduler
        .move_order_to_kitchen(&order_id, &caller.user_id, state.today())?;
    Ok(Json(report))
}

/// GET /admin/subscriptions?type=&frequency=&status=
pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<SubscriptionQuery>, QueryRejection>,
) -> Result<Json<Vec<SubscriptionView>>, ApiError> {
    require_admin(&state, &headers)?;
    let Query(query) = query?;
    let filter = SubscriptionFilter {
        kind: non_empty(query.kind)
            .map(|k| k.parse::<SubscriptionKind>())
            .transpose()?,
        plan: non_empty(query.frequency)
            .map(|p| p.parse::<Plan>())
            .transpose()?,
        status: non_empty(query.status)
            .map(|s| s.parse::<SubscriptionState>())
            .transpose()?,
    };
    Ok(Json(
        state.scheduler.admin_subscriptions(filter, state.today())?,
    ))
}
