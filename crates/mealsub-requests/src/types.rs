use chrono::NaiveDate;
use mealsub_core::{CoreError, SubscriptionKind};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    Pause,
    Skip,
    WithdrawPause,
}

impl RequestType {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestType::Pause => "PAUSE",
            RequestType::Skip => "SKIP",
            RequestType::WithdrawPause => "WITHDRAW_PAUSE",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAUSE" => Ok(RequestType::Pause),
            "SKIP" => Ok(RequestType::Skip),
            "WITHDRAW_PAUSE" => Ok(RequestType::WithdrawPause),
            other => Err(CoreError::InvalidValue {
                field: "requestType",
                value: other.to_string(),
            }),
        }
    }
}

/// PENDING → APPROVED | DECLINED (admin) or → WITHDRAWN (owner).
/// Every other status is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Declined,
    Withdrawn,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Declined => "DECLINED",
            RequestStatus::Withdrawn => "WITHDRAWN",
        }
    }

    pub fn is_terminal(self) -> bool {
        self != RequestStatus::Pending
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(RequestStatus::Pending),
            "APPROVED" => Ok(RequestStatus::Approved),
            "DECLINED" => Ok(RequestStatus::Declined),
            "WITHDRAWN" => Ok(RequestStatus::Withdrawn),
            other => Err(CoreError::InvalidValue {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// An admin's verdict on a PENDING request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approved,
    Declined,
}

impl Decision {
    pub fn status(self) -> RequestStatus {
        match self {
            Decision::Approved => RequestStatus::Approved,
            Decision::Declined => RequestStatus::Declined,
        }
    }
}

impl std::str::FromStr for Decision {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(Decision::Approved),
            "DECLINED" => Ok(Decision::Declined),
            other => Err(CoreError::InvalidValue {
                field: "decision",
                value: other.to_string(),
            }),
        }
    }
}

/// What a request targets: a subscription of some kind, or (for SKIP) a
/// single delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    MealPack,
    CustomMeal,
    Addon,
    Byo,
    Delivery,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::MealPack => "mealPack",
            RequestKind::CustomMeal => "customMeal",
            RequestKind::Addon => "addon",
            RequestKind::Byo => "byo",
            RequestKind::Delivery => "delivery",
        }
    }

    pub fn subscription_kind(self) -> Option<SubscriptionKind> {
        match self {
            RequestKind::MealPack => Some(SubscriptionKind::MealPack),
            RequestKind::CustomMeal => Some(SubscriptionKind::CustomMeal),
            RequestKind::Addon => Some(SubscriptionKind::Addon),
            RequestKind::Byo => Some(SubscriptionKind::Byo),
            RequestKind::Delivery => None,
        }
    }
}

impl From<SubscriptionKind> for RequestKind {
    fn from(kind: SubscriptionKind) -> Self {
        match kind {
            SubscriptionKind::MealPack => RequestKind::MealPack,
            SubscriptionKind::CustomMeal => RequestKind::CustomMeal,
            SubscriptionKind::Addon => RequestKind::Addon,
            SubscriptionKind::Byo => RequestKind::Byo,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "delivery" {
            return Ok(RequestKind::Delivery);
        }
        s.parse::<SubscriptionKind>().map(RequestKind::from)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseSkipRequest {
    pub id: String,
    pub request_type: RequestType,
    pub status: RequestStatus,
    pub kind: RequestKind,
    pub subscription_id: Option<String>,
    pub delivery_id: Option<String>,
    pub user_id: String,
    pub reason: Option<String>,
    pub pause_start_date: Option<NaiveDate>,
    pub pause_end_date: Option<NaiveDate>,
    pub skip_date: Option<NaiveDate>,
    /// For WITHDRAW_PAUSE: the PAUSE being withdrawn.
    pub linked_to: Option<String>,
    pub decided_by: Option<String>,
    /// RFC3339
    pub decided_at: Option<String>,
    /// Local calendar date of the decision.
    pub decision_date: Option<NaiveDate>,
    pub admin_note: Option<String>,
    /// PAUSE only: deliveries removed / appended at approval time.
    pub removed_count: Option<u32>,
    pub compensated_count: Option<u32>,
    pub created_at: String,
    pub updated_at: String,
}

impl PauseSkipRequest {
    /// `(start, end)` for a PAUSE with both dates set.
    pub fn pause_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.pause_start_date, self.pause_end_date) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    /// Servings removed by the pause that were never appended back.
    pub fn compensation_deficit(&self) -> u32 {
        let removed = self.removed_count.unwrap_or(0);
        removed.saturating_sub(self.compensated_count.unwrap_or(0))
    }
}

#[derive(Debug, Clone)]
pub struct NewRequest {
    pub request_type: RequestType,
    pub kind: RequestKind,
    pub user_id: String,
    pub subscription_id: Option<String>,
    pub delivery_id: Option<String>,
    pub reason: Option<String>,
    pub pause_start_date: Option<NaiveDate>,
    pub pause_end_date: Option<NaiveDate>,
    pub skip_date: Option<NaiveDate>,
    pub linked_to: Option<String>,
}

impl NewRequest {
    pub fn pause(
        user_id: &str,
        kind: SubscriptionKind,
        subscription_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        reason: Option<String>,
    ) -> Self {
        Self {
            request_type: RequestType::Pause,
            kind: kind.into(),
            user_id: user_id.to_string(),
            subscription_id: Some(subscription_id.to_string()),
            delivery_id: None,
            reason,
            pause_start_date: Some(start),
            pause_end_date: Some(end),
            skip_date: None,
            linked_to: None,
        }
    }

    pub fn skip(
        user_id: &str,
        delivery_id: &str,
        subscription_id: Option<String>,
        skip_date: NaiveDate,
        reason: Option<String>,
    ) -> Self {
        Self {
            request_type: RequestType::Skip,
            kind: RequestKind::Delivery,
            user_id: user_id.to_string(),
            subscription_id,
            delivery_id: Some(delivery_id.to_string()),
            reason,
            pause_start_date: None,
            pause_end_date: None,
            skip_date: Some(skip_date),
            linked_to: None,
        }
    }

    /// Withdrawal of `pause`; copies its subscription and window.
    pub fn withdraw_pause(pause: &PauseSkipRequest) -> Self {
        Self {
            request_type: RequestType::WithdrawPause,
            kind: pause.kind,
            user_id: pause.user_id.clone(),
            subscription_id: pause.subscription_id.clone(),
            delivery_id: None,
            reason: None,
            pause_start_date: pause.pause_start_date,
            pause_end_date: pause.pause_end_date,
            skip_date: None,
            linked_to: Some(pause.id.clone()),
        }
    }
}

/// Optional listing filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub request_type: Option<RequestType>,
}
