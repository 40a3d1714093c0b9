//! Delivery listings and kitchen status updates.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::HeaderMap,
    Json,
};
use mealsub_core::calendar::{add_days, parse_iso_date};
use mealsub_deliveries::{Delivery, DeliveryStatus};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::http::auth::{authenticate, require_admin};
use crate::http::error::ApiError;
use crate::http::subscriptions::non_empty;

/// Days shown by `/deliveries/mine` when no range is given.
const DEFAULT_RANGE_DAYS: i64 = 14;

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KitchenQuery {
    pub date: Option<String>,
    pub status: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

/// GET /deliveries/mine?from=&to=
///
/// Defaults to today and the following two weeks.
pub async fn my_deliveries(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<Vec<Delivery>>, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let Query(query) = query?;
    let from = match non_empty(query.from) {
        Some(s) => parse_iso_date(&s)?,
        None => state.today(),
    };
    let to = match non_empty(query.to) {
        Some(s) => parse_iso_date(&s)?,
        None => add_days(from, DEFAULT_RANGE_DAYS - 1),
    };
    let rows = state.scheduler.my_deliveries(&caller.user_id, from, to)?;
    Ok(Json(rows))
}

/// GET /admin/kitchen/deliveries?date=&status=&userId=
pub async fn kitchen_deliveries(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<KitchenQuery>, QueryRejection>,
) -> Result<Json<Vec<Delivery>>, ApiError> {
    require_admin(&state, &headers)?;
    let Query(query) = query?;
    let date = match non_empty(query.date) {
        Some(s) => parse_iso_date(&s)?,
        None => state.today(),
    };
    let status = non_empty(query.status)
        .map(|s| s.parse::<DeliveryStatus>())
        .transpose()?;
    let user_id = non_empty(query.user_id);
    let rows = state
        .scheduler
        .kitchen_deliveries(date, status, user_id.as_deref())?;
    Ok(Json(rows))
}

/// PATCH /admin/kitchen/deliveries/{delivery_id}/status
pub async fn update_kitchen_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(delivery_id): Path<String>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Json<Delivery>, ApiError> {
    let caller = require_admin(&state, &headers)?;
    let Json(body) = body?;
    let next: DeliveryStatus = body.status.parse()?;
    let delivery = state.scheduler.update_kitchen_status(
        &delivery_id,
        next,
        &caller.user_id,
        state.today(),
    )?;
    info!(delivery_id = %delivery.id, status = %delivery.status, "kitchen update via http");
    Ok(Json(delivery))
}
