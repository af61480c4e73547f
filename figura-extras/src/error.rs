//! Error types for figura-extras

use thiserror::Error;

/// Errors that can occur in figura-extras
#[derive(Error, Debug)]
pub enum ExtrasError {
    /// Telemetry initialization error
    #[cfg(feature = "telemetry")]
    #[error("Telemetry initialization error: {0}")]
    TelemetryInit(String),

    /// Log file could not be prepared
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for figura-extras operations
pub type Result<T> = std::result::Result<T, ExtrasError>;
