use mealsub_core::CoreError;
use thiserror::Error;

use crate::types::DeliveryStatus;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Delivery not found: {id}")]
    NotFound { id: String },

    /// The requested status change would move backwards or out of a
    /// terminal state.
    #[error("Cannot move delivery from {from} to {to}")]
    InvalidTransition {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    /// Kitchen updates are limited to today's deliveries.
    #[error("Delivery is scheduled for {date}, only today's deliveries can be updated")]
    NotToday { date: String },

    #[error(transparent)]
    Invalid(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, DeliveryError>;
