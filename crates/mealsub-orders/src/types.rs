use chrono::NaiveDate;
use mealsub_core::{CoreError, Plan, SubscriptionKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle as far as the kitchen is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    InKitchen,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::InKitchen => "in_kitchen",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "in_kitchen" => Ok(OrderStatus::InKitchen),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(CoreError::InvalidValue {
                field: "order status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "paid" => Ok(PaymentStatus::Paid),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(CoreError::InvalidValue {
                field: "payment status",
                value: other.to_string(),
            }),
        }
    }
}

/// One order line. Recurring lines are subscriptions keyed by `cart_item_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub cart_item_id: String,
    pub order_id: String,
    /// Owner of the parent order.
    pub user_id: String,
    pub name: String,
    pub plan: Plan,
    pub kind: SubscriptionKind,
    pub quantity: u32,
    pub start_date: NaiveDate,
    /// HH:mm
    pub delivery_time: String,
    /// Deliver starting today regardless of `start_date`.
    pub immediate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Chosen date for single/trial-only orders.
    pub delivery_date: Option<NaiveDate>,
    pub delivery_time: Option<String>,
    pub immediate: bool,
    pub moved_to_kitchen_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// True when every line is a one-off (single or trial) purchase, which
    /// the kitchen serves as one combined delivery.
    pub fn is_one_off_only(&self) -> bool {
        !self.items.is_empty()
            && self
                .items
                .iter()
                .all(|i| matches!(i.plan, Plan::Single | Plan::Trial))
    }
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub name: String,
    pub plan: Plan,
    pub kind: SubscriptionKind,
    pub quantity: u32,
    pub start_date: NaiveDate,
    pub delivery_time: String,
    pub immediate: bool,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub delivery_date: Option<NaiveDate>,
    pub delivery_time: Option<String>,
    pub immediate: bool,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Paused,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "paused" => Ok(SubscriptionStatus::Paused),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            other => Err(CoreError::InvalidValue {
                field: "subscription status",
                value: other.to_string(),
            }),
        }
    }
}

/// Persisted state of a DB-backed (`customMeal` / `addon`) subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    /// Same value as the order line's `cart_item_id`.
    pub id: String,
    pub user_id: String,
    pub kind: SubscriptionKind,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub pause_start_date: Option<NaiveDate>,
    pub pause_end_date: Option<NaiveDate>,
    pub pause_reason: Option<String>,
    pub pause_request_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Pause metadata written onto a subscription row when a pause is approved.
#[derive(Debug, Clone)]
pub struct PauseStamp {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub reason: Option<String>,
    pub request_id: String,
}

/// Contact details shown next to requests in the admin queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}
