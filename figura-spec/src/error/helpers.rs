//! User-facing error helpers.
//!
//! Turns a [`PipelineError`] into a summary the presentation layer can render
//! directly: the raw provider message plus short suggestions.

use super::types::{ErrorKind, PipelineError};

/// Structured error summary for CLI/UI consumption
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorSummary {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    /// Original provider message when available; otherwise best-effort
    pub message: String,
    pub suggestions: Vec<String>,
}

impl std::fmt::Display for ErrorSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "[{} http={}] {}", self.kind, status, self.message)?,
            None => write!(f, "[{}] {}", self.kind, self.message)?,
        }
        for tip in &self.suggestions {
            write!(f, "\n  - {tip}")?;
        }
        Ok(())
    }
}

/// Summarize a pipeline error with friendly suggestions.
pub fn summarize_error(err: &PipelineError) -> ErrorSummary {
    ErrorSummary {
        kind: err.kind(),
        status: err.status_code(),
        message: err.message(),
        suggestions: suggest_fixes(err),
    }
}

/// Suggest fixes based on the error variant.
pub fn suggest_fixes(err: &PipelineError) -> Vec<String> {
    let mut tips = Vec::new();
    match err {
        PipelineError::InvalidInput(_) => {
            tips.push("Select a non-empty image file (PNG, JPEG or WebP)".to_string());
            tips.push("Pick one of the listed styles".to_string());
        }
        PipelineError::MissingCredential(_) => {
            tips.push("Set GEMINI_API_KEY or pass an API key explicitly".to_string());
        }
        PipelineError::ImageDeclined(_) => {
            tips.push("The model answered with text instead of an image".to_string());
            tips.push("Try a different photo or another style".to_string());
        }
        PipelineError::EmptyAnalysis => {
            tips.push("Try a clearer photo where the subject is visible".to_string());
        }
        PipelineError::ParseError(_) => {
            tips.push("Check that the base URL points at a Gemini-compatible endpoint".to_string());
        }
        PipelineError::HttpError(_) | PipelineError::TimeoutError(_) => {
            tips.push("Check network connectivity and try again".to_string());
        }
        PipelineError::ApiError { code, .. } => match code {
            401 | 403 => tips.push("Verify the API key and its project permissions".to_string()),
            429 => tips.push("Rate limited; wait a moment before starting a new run".to_string()),
            400 => tips.push("Check the image format and size".to_string()),
            c if *c >= 500 => {
                tips.push("The provider is having trouble; try again later".to_string())
            }
            _ => {}
        },
    }
    tips
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declined_suggests_other_style() {
        let summary = summarize_error(&PipelineError::ImageDeclined("I can't".into()));
        assert_eq!(summary.kind, ErrorKind::Permanent);
        assert_eq!(summary.message, "I can't");
        assert!(summary.suggestions.iter().any(|s| s.contains("another style")));
    }

    #[test]
    fn api_error_keeps_status() {
        let summary = summarize_error(&PipelineError::api_error(401, "API key not valid"));
        assert_eq!(summary.status, Some(401));
        assert_eq!(summary.kind, ErrorKind::Permanent);
        let rendered = summary.to_string();
        assert!(rendered.starts_with("[permanent http=401] API key not valid"));
        assert!(rendered.contains("Verify the API key"));
    }
}
