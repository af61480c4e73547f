//! Type Conversions for PipelineError
//!
//! From implementations for the foreign errors the pipeline touches.

use super::types::PipelineError;

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimeoutError(err.to_string())
        } else if err.is_decode() {
            Self::ParseError(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<base64::DecodeError> for PipelineError {
    fn from(err: base64::DecodeError) -> Self {
        Self::ParseError(format!("invalid base64 payload: {err}"))
    }
}
