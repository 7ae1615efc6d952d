//! Error types for route map services.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using RouteError.
pub type RouteResult<T> = Result<T, RouteError>;

/// Primary error type for route map operations.
#[derive(Debug, Error)]
pub enum RouteError {
    // === Input Errors ===
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // === Lookup Errors ===
    #[error("No region found at ({lat}, {lon})")]
    LookupMiss { lat: f64, lon: f64 },

    // === Rendering Errors ===
    #[error("Rendering failed: {0}")]
    RenderFailure(String),

    #[error("Renderer did not finish within {0:?}")]
    RenderTimeout(Duration),

    #[error("Image processing failed: {0}")]
    Image(String),

    // === Storage Errors ===
    #[error("Storage error: {0}")]
    StoreFailure(String),

    #[error("Cache error: {0}")]
    CacheFailure(String),

    // === Infrastructure Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`RouteError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    LookupMiss,
    RenderFailure,
    StoreFailure,
    Internal,
}

impl RouteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouteError::InvalidInput(_) | RouteError::NotFound(_) => ErrorKind::InvalidInput,
            RouteError::LookupMiss { .. } => ErrorKind::LookupMiss,
            RouteError::RenderFailure(_) | RouteError::RenderTimeout(_) => {
                ErrorKind::RenderFailure
            }
            RouteError::StoreFailure(_) | RouteError::CacheFailure(_) => ErrorKind::StoreFailure,
            RouteError::Image(_) | RouteError::Config(_) | RouteError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether the caller may retry the same request unchanged.
    ///
    /// Invalid input is never retried; lookup misses are recovered locally
    /// and never reach a caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RenderFailure | ErrorKind::StoreFailure
        )
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        RouteError::InvalidInput(message.into())
    }
}

// Conversion from common error types
impl From<std::io::Error> for RouteError {
    fn from(err: std::io::Error) -> Self {
        RouteError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for RouteError {
    fn from(err: serde_json::Error) -> Self {
        RouteError::InvalidInput(format!("JSON error: {}", err))
    }
}
