//! HTTP failure classification
//!
//! Maps provider HTTP failures onto [`PipelineError`] so the backoff executor
//! can tell retryable outcomes (429, 5xx) from permanent ones.

use crate::error::PipelineError;

pub use crate::error::is_retryable_status;

/// Classify a non-2xx response.
///
/// The provider's `error.message` is used when the body is a well-formed
/// error envelope; otherwise the canonical reason or a short body sample.
pub fn classify_http_error(
    status: u16,
    body_text: &str,
    fallback_message: Option<&str>,
) -> PipelineError {
    let parsed = serde_json::from_str::<serde_json::Value>(body_text).ok();

    if let Some(json) = parsed.as_ref()
        && let Some(message) = provider_error_message(json)
    {
        return PipelineError::api_error_with_details(status, message, json.clone());
    }

    // Limit body sample size to avoid noisy logs
    let body_sample = body_text.chars().take(200).collect::<String>();
    let message = if let Some(fallback) = fallback_message {
        fallback.to_string()
    } else if body_sample.trim().is_empty() {
        "api error".to_string()
    } else {
        body_sample.clone()
    };

    let details = match parsed {
        Some(json) => serde_json::json!({ "status": status, "response": json }),
        None => serde_json::json!({ "status": status, "raw": body_sample }),
    };
    PipelineError::api_error_with_details(status, message, details)
}

/// Detect an error envelope delivered with a 2xx status.
///
/// Only meaningful for 2xx statuses, which never classify as retryable.
pub fn api_error_in_body(status: u16, body: &serde_json::Value) -> Option<PipelineError> {
    let envelope = body.get("error")?;
    if envelope.is_null() {
        return None;
    }
    let message = provider_error_message(body).unwrap_or_else(|| "Unknown error".to_string());
    Some(PipelineError::api_error_with_details(status, message, body.clone()))
}

/// `{ "error": { "message": "..." } }` → the message
fn provider_error_message(body: &serde_json::Value) -> Option<String> {
    let error = body.get("error")?;
    error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}
