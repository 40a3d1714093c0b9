use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A date string that is not a valid `YYYY-MM-DD` calendar date.
    #[error("Invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    /// A time string that is not a valid `HH:mm` time of day.
    #[error("Invalid time '{value}': expected HH:mm")]
    InvalidTime { value: String },

    /// An enum-like field carried a value outside its allowed set.
    #[error("Invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

impl CoreError {
    /// Short error code string returned to HTTP clients.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "CONFIG_ERROR",
            CoreError::InvalidDate { .. } => "INVALID_DATE",
            CoreError::InvalidTime { .. } => "INVALID_TIME",
            CoreError::InvalidValue { .. } => "INVALID_VALUE",
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
