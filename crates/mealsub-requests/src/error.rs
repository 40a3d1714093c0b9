use mealsub_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Request not found: {id}")]
    NotFound { id: String },

    /// A partial UNIQUE index rejected the insert.
    #[error("{0}")]
    Duplicate(String),

    #[error(transparent)]
    Invalid(#[from] CoreError),
}

impl RequestError {
    pub fn code(&self) -> &'static str {
        match self {
            RequestError::Database(_) => "DATABASE_ERROR",
            RequestError::NotFound { .. } => "REQUEST_NOT_FOUND",
            RequestError::Duplicate(_) => "DUPLICATE_REQUEST",
            RequestError::Invalid(e) => e.code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RequestError>;
