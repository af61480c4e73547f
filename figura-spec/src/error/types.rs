//! Core error types for the generation pipeline.

use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a pipeline failure.
///
/// Every [`PipelineError`] maps to exactly one kind; the kind decides whether
/// the backoff executor may retry and how the failure is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Missing or malformed input/credential. No network call was attempted.
    Validation,
    /// HTTP 429/5xx or a transport failure. Retried internally.
    Transient,
    /// Non-retryable HTTP error, or a well-formed response without the expected payload.
    Permanent,
    /// The response violates the expected contract entirely.
    Unparseable,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::Unparseable => "unparseable",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Input image or style missing/malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No API credential was supplied by the hosting environment
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Connection-level failure (no HTTP response at all)
    #[error("HTTP transport error: {0}")]
    HttpError(String),

    /// A single attempt exceeded its timeout
    #[error("Request timed out: {0}")]
    TimeoutError(String),

    /// Provider answered with an error status or an error envelope
    #[error("API error {code}: {message}")]
    ApiError {
        code: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// The image model replied with commentary instead of an image
    #[error("Image generation declined: {0}")]
    ImageDeclined(String),

    /// The analysis stage produced no usable text
    #[error("Analysis failed to produce a prompt")]
    EmptyAnalysis,

    /// Response body does not have the expected shape
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl PipelineError {
    /// Create an API error without details
    pub fn api_error(code: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create an API error carrying the provider body
    pub fn api_error_with_details(
        code: u16,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    /// Map the variant onto the pipeline taxonomy.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::MissingCredential(_) => ErrorKind::Validation,
            Self::HttpError(_) | Self::TimeoutError(_) => ErrorKind::Transient,
            Self::ApiError { code, .. } => {
                if is_retryable_status(*code) {
                    ErrorKind::Transient
                } else {
                    ErrorKind::Permanent
                }
            }
            Self::ImageDeclined(_) | Self::EmptyAnalysis => ErrorKind::Permanent,
            Self::ParseError(_) => ErrorKind::Unparseable,
        }
    }

    /// Whether the backoff executor may try again after this error.
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient)
    }

    /// HTTP status associated with the failure, when there was one.
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Human-readable message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::InvalidInput(msg)
            | Self::MissingCredential(msg)
            | Self::HttpError(msg)
            | Self::TimeoutError(msg)
            | Self::ImageDeclined(msg)
            | Self::ParseError(msg) => msg.clone(),
            Self::ApiError { message, .. } => message.clone(),
            Self::EmptyAnalysis => "analysis failed to produce a prompt".to_string(),
        }
    }
}

/// HTTP 429 and every 5xx are worth another attempt.
pub const fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}
