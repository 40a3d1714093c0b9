use chrono::NaiveDate;
use mealsub_core::{CoreError, Plan, SubscriptionKind};
use mealsub_orders::Customer;
use mealsub_requests::{PauseSkipRequest, PauseWindow, RequestKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of a pause request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseInput {
    pub kind: RequestKind,
    pub subscription_id: String,
    pub pause_start_date: NaiveDate,
    pub pause_end_date: NaiveDate,
    #[serde(default)]
    pub reason: Option<String>,
}

/// What moving an order to the kitchen produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationReport {
    pub order_id: String,
    /// Deliveries inserted by this call.
    pub created: usize,
    /// Slots that were already scheduled (retried activation or a race).
    pub duplicates: usize,
    /// DB-backed subscription rows inserted by this call.
    pub subscriptions_created: usize,
    /// False when the order was already in the kitchen.
    pub transitioned: bool,
}

/// Admin queue entry: the request plus the customer's contact details.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminRequestView {
    #[serde(flatten)]
    pub request: PauseSkipRequest,
    pub customer: Option<Customer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    Active,
    Paused,
    Cancelled,
    Completed,
}

impl SubscriptionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionState::Active => "active",
            SubscriptionState::Paused => "paused",
            SubscriptionState::Cancelled => "cancelled",
            SubscriptionState::Completed => "completed",
        }
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionState::Active),
            "paused" => Ok(SubscriptionState::Paused),
            "cancelled" => Ok(SubscriptionState::Cancelled),
            "completed" => Ok(SubscriptionState::Completed),
            other => Err(CoreError::InvalidValue {
                field: "subscription status",
                value: other.to_string(),
            }),
        }
    }
}

/// One subscription as every listing renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub subscription_id: String,
    pub user_id: String,
    pub order_id: String,
    pub kind: SubscriptionKind,
    pub plan: Plan,
    pub name: String,
    pub status: SubscriptionState,
    pub base_start_date: NaiveDate,
    pub delivery_time: String,
    pub cycle_start_date: NaiveDate,
    pub cycle_end_date: NaiveDate,
    pub delivered: u32,
    pub total: u32,
    pub remaining: u32,
    pub progress: u8,
    pub schedule_end_date: Option<NaiveDate>,
    pub next_serving_date: Option<NaiveDate>,
    pub skipped: u32,
    pub scheduled: u32,
    /// Latest effective pause window, if any.
    pub pause: Option<PauseWindow>,
}

/// Admin subscription listing filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriptionFilter {
    pub kind: Option<SubscriptionKind>,
    pub plan: Option<Plan>,
    pub status: Option<SubscriptionState>,
}

impl SubscriptionFilter {
    pub fn matches(&self, view: &SubscriptionView) -> bool {
        self.kind.map_or(true, |k| k == view.kind)
            && self.plan.map_or(true, |p| p == view.plan)
            && self.status.map_or(true, |s| s == view.status)
    }
}
