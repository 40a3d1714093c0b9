use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use mealsub_core::config::MealsubConfig;
use mealsub_scheduler::SchedulerHandle;
use mockable::Clock;

use crate::http;

/// Shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: MealsubConfig,
    pub scheduler: SchedulerHandle,
    /// Wall clock, read once per request.
    pub clock: Arc<dyn Clock + Send + Sync>,
}

impl AppState {
    pub fn new(
        config: MealsubConfig,
        scheduler: SchedulerHandle,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            config,
            scheduler,
            clock,
        }
    }

    /// Local wall-clock time; delivery dates and times are local.
    pub fn now(&self) -> NaiveDateTime {
        self.clock.local().naive_local()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(http::health::health_handler))
        // customer
        .route(
            "/subscriptions/requests",
            get(http::subscriptions::list_my_requests),
        )
        .route(
            "/subscriptions/pause-requests",
            post(http::subscriptions::create_pause_request),
        )
        .route(
            "/subscriptions/withdraw-pause-requests",
            post(http::subscriptions::create_withdraw_request),
        )
        .route(
            "/subscriptions/skip-requests",
            post(http::subscriptions::create_skip_request),
        )
        .route(
            "/subscriptions/requests/{request_id}/withdraw",
            post(http::subscriptions::withdraw_request),
        )
        .route(
            "/subscriptions/mine",
            get(http::subscriptions::my_subscriptions),
        )
        .route("/deliveries/mine", get(http::deliveries::my_deliveries))
        // admin
        .route(
            "/admin/pause-skip/requests",
            get(http::admin::list_requests),
        )
        .route(
            "/admin/pause-skip/requests/{request_id}/decide",
            post(http::admin::decide_request),
        )
        .route(
            "/admin/orders/{order_id}/move-to-kitchen",
            post(http::admin::move_to_kitchen),
        )
        .route(
            "/admin/kitchen/deliveries",
            get(http::deliveries::kitchen_deliveries),
        )
        .route(
            "/admin/kitchen/deliveries/{delivery_id}/status",
            patch(http::deliveries::update_kitchen_status),
        )
        .route(
            "/admin/subscriptions",
            get(http::admin::list_subscriptions),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
