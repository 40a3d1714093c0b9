use mealsub_core::CoreError;
use mealsub_deliveries::DeliveryError;
use mealsub_orders::OrderError;
use mealsub_requests::RequestError;
use thiserror::Error;

/// Errors surfaced by the scheduling engine to its callers.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Malformed or inconsistent input (bad range, wrong kind, end < start).
    #[error("{0}")]
    Validation(String),

    /// Well-formed input refused by a business rule (cutoff, duplicate,
    /// subscription not active).
    #[error("{0}")]
    Policy(String),

    /// The entity does not exist or is not visible to the caller.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// Someone else changed the entity first; safe to re-fetch and retry.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Invalid(#[from] CoreError),
}

impl SchedulerError {
    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        SchedulerError::NotFound {
            what,
            id: id.into(),
        }
    }

    /// Short error code string returned to HTTP clients.
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::Database(_) => "DATABASE_ERROR",
            SchedulerError::Validation(_) => "VALIDATION_ERROR",
            SchedulerError::Policy(_) => "POLICY_VIOLATION",
            SchedulerError::NotFound { .. } => "NOT_FOUND",
            SchedulerError::Conflict(_) => "CONFLICT",
            SchedulerError::Invalid(e) => e.code(),
        }
    }
}

impl From<OrderError> for SchedulerError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Database(e) => SchedulerError::Database(e),
            OrderError::NotFound { id } => SchedulerError::not_found("Order", id),
            OrderError::Invalid(e) => SchedulerError::Invalid(e),
        }
    }
}

impl From<DeliveryError> for SchedulerError {
    fn from(e: DeliveryError) -> Self {
        match e {
            DeliveryError::Database(e) => SchedulerError::Database(e),
            DeliveryError::NotFound { id } => SchedulerError::not_found("Delivery", id),
            e @ DeliveryError::InvalidTransition { .. } => SchedulerError::Validation(e.to_string()),
            e @ DeliveryError::NotToday { .. } => SchedulerError::Policy(e.to_string()),
            DeliveryError::Invalid(e) => SchedulerError::Invalid(e),
        }
    }
}

impl From<RequestError> for SchedulerError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::Database(e) => SchedulerError::Database(e),
            RequestError::NotFound { id } => SchedulerError::not_found("Request", id),
            RequestError::Duplicate(msg) => SchedulerError::Policy(msg),
            RequestError::Invalid(e) => SchedulerError::Invalid(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
