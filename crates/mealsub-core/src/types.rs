use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Billing plan of an order line.
///
/// `Single` and `Trial` are one-off purchases; `Weekly` and `Monthly` renew
/// on a fixed period anchored to the line's original start date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Single,
    Trial,
    Weekly,
    Monthly,
}

impl Plan {
    /// Length of one serving cycle in calendar days.
    pub fn period_days(self) -> i64 {
        match self {
            Plan::Trial => 3,
            Plan::Weekly => 7,
            Plan::Monthly => 28,
            Plan::Single => 1,
        }
    }

    /// Servings owed per cycle when the order line does not say otherwise.
    pub fn default_total_servings(self) -> u32 {
        match self {
            Plan::Trial => 3,
            Plan::Weekly => 5,
            Plan::Monthly => 20,
            Plan::Single => 1,
        }
    }

    /// True for plans that produce a per-line delivery schedule.
    pub fn is_recurring(self) -> bool {
        matches!(self, Plan::Weekly | Plan::Monthly)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Single => "single",
            Plan::Trial => "trial",
            Plan::Weekly => "weekly",
            Plan::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Plan {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Plan::Single),
            "trial" => Ok(Plan::Trial),
            "weekly" => Ok(Plan::Weekly),
            "monthly" => Ok(Plan::Monthly),
            other => Err(CoreError::InvalidValue {
                field: "plan",
                value: other.to_string(),
            }),
        }
    }
}

/// What a subscription line actually contains.
///
/// `CustomMeal` and `Addon` subscriptions additionally own a row in the
/// `subscriptions` table that carries their status and pause metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubscriptionKind {
    MealPack,
    CustomMeal,
    Addon,
    Byo,
}

impl SubscriptionKind {
    /// Kinds backed by a `subscriptions` row.
    pub fn is_db_backed(self) -> bool {
        matches!(self, SubscriptionKind::CustomMeal | SubscriptionKind::Addon)
    }

    /// Kinds a customer may pause.
    pub fn is_pausable(self) -> bool {
        !matches!(self, SubscriptionKind::Byo)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionKind::MealPack => "mealPack",
            SubscriptionKind::CustomMeal => "customMeal",
            SubscriptionKind::Addon => "addon",
            SubscriptionKind::Byo => "byo",
        }
    }
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mealPack" => Ok(SubscriptionKind::MealPack),
            "customMeal" => Ok(SubscriptionKind::CustomMeal),
            "addon" => Ok(SubscriptionKind::Addon),
            "byo" => Ok(SubscriptionKind::Byo),
            other => Err(CoreError::InvalidValue {
                field: "kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Caller role as resolved by the upstream auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            other => Err(CoreError::InvalidValue {
                field: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// Outcome of a conditional single-row mutation.
///
/// Store helpers return this instead of an error so best-effort callers can
/// log and move on while strict callers map `Conflict` / `NotFound` to their
/// own error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<T> {
    /// The row matched its precondition and was updated.
    Applied(T),
    /// The row exists but no longer satisfies the precondition
    /// (status moved on, target slot taken, duplicate key).
    Conflict,
    /// No row with that id.
    NotFound,
}

impl<T> Mutation<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Mutation::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Mutation::Applied(v) => Some(v),
            _ => None,
        }
    }

    /// Short label for structured log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Mutation::Applied(_) => "applied",
            Mutation::Conflict => "conflict",
            Mutation::NotFound => "not_found",
        }
    }
}
