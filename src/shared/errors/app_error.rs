use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Transform error: {0}")]
    TransformError(String),

    #[error("Timeout: {0}")]
    TimeoutError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Short machine-friendly name of the variant, stored next to failed queue items
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::DatabaseError(_) => "DatabaseError",
            AppError::NotFound(_) => "NotFound",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::InvalidOperation(_) => "InvalidOperation",
            AppError::ConfigurationError(_) => "ConfigurationError",
            AppError::TransformError(_) => "TransformError",
            AppError::TimeoutError(_) => "TimeoutError",
            AppError::StorageError(_) => "StorageError",
            AppError::ExternalServiceError(_) => "ExternalServiceError",
            AppError::RateLimitError(_) => "RateLimitError",
            AppError::SerializationError(_) => "SerializationError",
            AppError::InternalError(_) => "InternalError",
        }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => {
                AppError::NotFound("Record not found in database".to_string())
            }
            _ => AppError::DatabaseError(err.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for AppError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        AppError::DatabaseError(format!("Database pool error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::TimeoutError(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            AppError::ExternalServiceError(format!(
                "Failed to connect to external service: {}",
                err
            ))
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                429 => AppError::RateLimitError("Too many requests".to_string()),
                404 => AppError::NotFound("External resource not found".to_string()),
                _ => AppError::ExternalServiceError(format!("HTTP {}: {}", status, err)),
            }
        } else {
            AppError::ExternalServiceError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::InternalError(format!("Blocking task failed: {}", err))
    }
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
