//! Gemini `generateContent` wire types
//!
//! Only the subset the pipeline sends and reads. Response parts are decoded one
//! at a time so that a malformed part never poisons its siblings.

use serde::{Deserialize, Serialize};

/// Response modalities requested from image-capable Gemini models.
pub const TEXT_AND_IMAGE: [&str; 2] = ["TEXT", "IMAGE"];

/// Gemini Generate Content Request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    /// Required. The content of the current conversation with the model.
    pub contents: Vec<Content>,
    /// Optional. Configuration options for model generation and outputs.
    #[serde(skip_serializing_if = "Option::is_none", rename = "generationConfig")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    /// A single-turn request made of the given parts.
    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self {
            contents: vec![Content { role: None, parts }],
            generation_config: None,
        }
    }

    pub fn with_response_modalities<I, S>(mut self, modalities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let config = self.generation_config.get_or_insert_with(GenerationConfig::default);
        config.response_modalities = Some(modalities.into_iter().map(Into::into).collect());
        self
    }
}

/// Content of a single turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Configuration options for model generation and outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Optional. Output response modalities (e.g., ["TEXT", "IMAGE"]).
    #[serde(skip_serializing_if = "Option::is_none", rename = "responseModalities")]
    pub response_modalities: Option<Vec<String>>,
}

/// A fragment of content: text, inline binary data, or something we do not use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData", alias = "inline_data")]
        inline_data: Blob,
    },
    Other(serde_json::Value),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::InlineData {
            inline_data: Blob {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }

    /// Decode one part from JSON; malformed parts become `Other`.
    pub fn from_value(value: &serde_json::Value) -> Self {
        Self::deserialize(value).unwrap_or_else(|_| Self::Other(value.clone()))
    }
}

/// Raw media bytes (base64) with their MIME type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blob {
    #[serde(rename = "mimeType", alias = "mime_type", default)]
    pub mime_type: String,
    pub data: String,
}
