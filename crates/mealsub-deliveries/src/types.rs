use chrono::NaiveDate;
use mealsub_core::calendar::to_iso;
use mealsub_core::progress::{ServingOutcome, ServingRecord};
use mealsub_core::{CoreError, Plan, SubscriptionKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kitchen pipeline position of a delivery.
///
/// Moves strictly forward PENDING → COOKING → PACKED → OUT_FOR_DELIVERY →
/// DELIVERED, or PENDING → SKIPPED. DELIVERED and SKIPPED never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    Cooking,
    Packed,
    OutForDelivery,
    Delivered,
    Skipped,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "PENDING",
            DeliveryStatus::Cooking => "COOKING",
            DeliveryStatus::Packed => "PACKED",
            DeliveryStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Skipped => "SKIPPED",
        }
    }

    /// Position in the kitchen pipeline; `None` for SKIPPED.
    fn pipeline_rank(self) -> Option<u8> {
        match self {
            DeliveryStatus::Pending => Some(0),
            DeliveryStatus::Cooking => Some(1),
            DeliveryStatus::Packed => Some(2),
            DeliveryStatus::OutForDelivery => Some(3),
            DeliveryStatus::Delivered => Some(4),
            DeliveryStatus::Skipped => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Skipped)
    }

    /// Still owes the customer a serving.
    pub fn is_serving_bearing(self) -> bool {
        !self.is_terminal()
    }

    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.pipeline_rank(), next.pipeline_rank()) {
            (Some(_), None) => self == DeliveryStatus::Pending,
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }

    pub fn outcome(self) -> ServingOutcome {
        match self {
            DeliveryStatus::Delivered => ServingOutcome::Delivered,
            DeliveryStatus::Skipped => ServingOutcome::Skipped,
            _ => ServingOutcome::Scheduled,
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(DeliveryStatus::Pending),
            "COOKING" => Ok(DeliveryStatus::Cooking),
            "PACKED" => Ok(DeliveryStatus::Packed),
            "OUT_FOR_DELIVERY" => Ok(DeliveryStatus::OutForDelivery),
            "DELIVERED" => Ok(DeliveryStatus::Delivered),
            "SKIPPED" => Ok(DeliveryStatus::Skipped),
            other => Err(CoreError::InvalidValue {
                field: "delivery status",
                value: other.to_string(),
            }),
        }
    }
}

/// One entry of a delivery's append-only status log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    /// `None` for the creation entry.
    pub from: Option<DeliveryStatus>,
    pub to: DeliveryStatus,
    /// RFC3339
    pub at: String,
    /// Actor id, or a system marker such as `system:activation`.
    pub by: String,
}

/// Order-line snapshot the kitchen needs to prepare a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryItem {
    pub cart_item_id: String,
    pub name: String,
    pub kind: SubscriptionKind,
    pub plan: Plan,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub id: String,
    pub user_id: String,
    pub subscription_id: Option<String>,
    pub date: NaiveDate,
    /// HH:mm
    pub time: String,
    pub status: DeliveryStatus,
    pub status_history: Vec<StatusChange>,
    pub items: Vec<DeliveryItem>,
    pub source_order_id: String,
    pub source_cart_item_id: Option<String>,
    #[serde(skip)]
    pub group_key: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Delivery {
    pub fn serving_record(&self) -> ServingRecord {
        ServingRecord {
            date: self.date,
            outcome: self.status.outcome(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub user_id: String,
    pub subscription_id: Option<String>,
    pub date: NaiveDate,
    pub time: String,
    pub items: Vec<DeliveryItem>,
    pub source_order_id: String,
    pub source_cart_item_id: Option<String>,
    /// Recorded as the actor of the creation history entry.
    pub created_by: String,
}

impl NewDelivery {
    /// Same subscription, template and time, different date.
    pub fn from_template(template: &Delivery, date: NaiveDate, created_by: &str) -> Self {
        Self {
            user_id: template.user_id.clone(),
            subscription_id: template.subscription_id.clone(),
            date,
            time: template.time.clone(),
            items: template.items.clone(),
            source_order_id: template.source_order_id.clone(),
            source_cart_item_id: template.source_cart_item_id.clone(),
            created_by: created_by.to_string(),
        }
    }

    pub fn group_key(&self) -> String {
        group_key(
            &self.user_id,
            self.subscription_id.as_deref(),
            &self.source_order_id,
            self.date,
            &self.time,
        )
    }
}

/// Result of an insert that may race with an identical one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Delivery),
    /// A delivery for the same group key already exists.
    Duplicate,
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// Uniqueness key for a delivery.
///
/// Subscription deliveries are unique per (user, subscription, date);
/// combined one-off deliveries per (user, order, date, time).
pub fn group_key(
    user_id: &str,
    subscription_id: Option<&str>,
    order_id: &str,
    date: NaiveDate,
    time: &str,
) -> String {
    match subscription_id {
        Some(sub) => format!("{user_id}|sub:{sub}|{}", to_iso(date)),
        None => format!("{user_id}|order:{order_id}|{}|{time}", to_iso(date)),
    }
}
