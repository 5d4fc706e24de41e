//! Startup and wiring errors shared by the pgpaas crates

use thiserror::Error;

/// Errors raised while assembling the service (config, clients, storage)
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Result type alias for service wiring operations
pub type ServiceResult<T> = Result<T, ServiceError>;
