//! Response extraction
//!
//! Walks a provider response and pulls out either an image or text. Every
//! nested field is treated as optional: malformed entries are skipped and only
//! a response with no recognisable container at all is `Unparseable`.

use serde::Deserialize;
use serde_json::Value;

use crate::error::PipelineError;
use crate::protocol::gemini::Part;
use crate::protocol::imagen::Prediction;
use crate::types::ImagePayload;

/// MIME assumed when the provider omits one.
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

const SNIPPET_CHARS: usize = 200;

/// Strategy for reading provider responses.
pub trait ResponseExtractor: Send + Sync {
    /// First inline image of a generation response.
    fn extract_image(&self, raw: &Value) -> Result<ImagePayload, PipelineError>;
    /// Text answer of an analysis response.
    fn extract_text(&self, raw: &Value) -> Result<String, PipelineError>;
}

/// Reads Gemini `generateContent` and Imagen `predict` responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiExtractor;

impl ResponseExtractor for GeminiExtractor {
    fn extract_image(&self, raw: &Value) -> Result<ImagePayload, PipelineError> {
        extract_image(raw)
    }

    fn extract_text(&self, raw: &Value) -> Result<String, PipelineError> {
        extract_text(raw)
    }
}

/// Find the first inline image in `candidates[*].content.parts[*]` or `predictions[*]`.
///
/// Once either container is present, a missing image is reported as
/// [`PipelineError::ImageDeclined`], with the model's text or filter reason
/// when there is one.
pub fn extract_image(raw: &Value) -> Result<ImagePayload, PipelineError> {
    let Some(obj) = raw.as_object() else {
        return Err(PipelineError::ParseError(
            "response is not a JSON object".into(),
        ));
    };
    let candidates = obj.get("candidates").and_then(Value::as_array);
    let predictions = obj.get("predictions").and_then(Value::as_array);

    if candidates.is_none() && predictions.is_none() {
        if let Some(reason) = block_reason(raw) {
            return Err(PipelineError::ImageDeclined(format!(
                "the prompt was blocked ({reason})"
            )));
        }
        return Err(PipelineError::ParseError(
            "response has neither candidates nor predictions".into(),
        ));
    }

    let mut first_text: Option<String> = None;
    let mut finish_reason: Option<String> = None;

    for candidate in candidates.into_iter().flatten() {
        if finish_reason.is_none() {
            finish_reason = candidate
                .get("finishReason")
                .and_then(Value::as_str)
                .map(str::to_string);
        }
        for part in candidate_parts(candidate) {
            match Part::from_value(part) {
                Part::InlineData { inline_data }
                    if !inline_data.data.trim().is_empty()
                        && is_image_mime(&inline_data.mime_type) =>
                {
                    let mime = if inline_data.mime_type.is_empty() {
                        DEFAULT_IMAGE_MIME.to_string()
                    } else {
                        inline_data.mime_type
                    };
                    return Ok(ImagePayload::new(inline_data.data, mime));
                }
                Part::Text { text } if first_text.is_none() && !text.trim().is_empty() => {
                    first_text = Some(text);
                }
                _ => {}
            }
        }
    }

    for prediction in predictions.into_iter().flatten() {
        let Ok(prediction) = Prediction::deserialize(prediction) else {
            continue;
        };
        if finish_reason.is_none() {
            finish_reason = prediction.rai_filtered_reason.clone();
        }
        if let Some(data) = prediction.bytes_base64_encoded
            && !data.trim().is_empty()
        {
            let mime = prediction
                .mime_type
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());
            return Ok(ImagePayload::new(data, mime));
        }
    }

    if let Some(text) = first_text {
        return Err(PipelineError::ImageDeclined(format!(
            "the model replied with text instead of an image: {}",
            snippet(&text)
        )));
    }
    if let Some(reason) = block_reason(raw).or(finish_reason) {
        return Err(PipelineError::ImageDeclined(format!(
            "no image was returned ({reason})"
        )));
    }
    Err(PipelineError::ImageDeclined("no image was returned".into()))
}

/// Concatenated text of the first candidate that has any.
///
/// Thought summaries (`"thought": true`) are skipped.
pub fn extract_text(raw: &Value) -> Result<String, PipelineError> {
    let Some(candidates) = raw.get("candidates").and_then(Value::as_array) else {
        if block_reason(raw).is_some() {
            return Err(PipelineError::EmptyAnalysis);
        }
        return Err(PipelineError::ParseError(
            "analysis response has no candidates".into(),
        ));
    };

    for candidate in candidates {
        let text: String = candidate_parts(candidate)
            .filter(|part| part.get("thought").and_then(Value::as_bool) != Some(true))
            .filter_map(|part| match Part::from_value(part) {
                Part::Text { text } => Some(text),
                _ => None,
            })
            .collect();
        let text = text.trim();
        if !text.is_empty() {
            return Ok(text.to_string());
        }
    }
    Err(PipelineError::EmptyAnalysis)
}

fn candidate_parts(candidate: &Value) -> impl Iterator<Item = &Value> {
    candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn block_reason(raw: &Value) -> Option<String> {
    raw.get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn is_image_mime(mime: &str) -> bool {
    mime.is_empty() || mime.starts_with("image/")
}

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    let mut out: String = trimmed.chars().take(SNIPPET_CHARS).collect();
    if trimmed.chars().count() > SNIPPET_CHARS {
        out.push('…');
    }
    out
}
