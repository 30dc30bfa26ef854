use thiserror::Error;

/// Main error type for the pattern service
#[derive(Error, Debug)]
pub enum SharplineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Request validation errors
    #[error("Invalid filter for {field}: {reason}")]
    InvalidFilter { field: String, reason: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for SharplineError
pub type Result<T> = std::result::Result<T, SharplineError>;

impl SharplineError {
    pub fn invalid_filter(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SharplineError::InvalidFilter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SharplineError::InvalidFilter { .. } | SharplineError::Validation(_)
        )
    }
}
