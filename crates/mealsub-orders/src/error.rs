use mealsub_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Order not found: {id}")]
    NotFound { id: String },

    #[error(transparent)]
    Invalid(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, OrderError>;
