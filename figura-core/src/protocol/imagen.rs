//! Imagen `:predict` wire types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub instances: Vec<PredictInstance>,
    pub parameters: PredictParameters,
}

impl PredictRequest {
    pub fn new(prompt: impl Into<String>, sample_count: u32) -> Self {
        Self {
            instances: vec![PredictInstance {
                prompt: prompt.into(),
            }],
            parameters: PredictParameters { sample_count },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictInstance {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictParameters {
    #[serde(rename = "sampleCount")]
    pub sample_count: u32,
}

/// One entry of `predictions`; every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Prediction {
    #[serde(rename = "bytesBase64Encoded", default)]
    pub bytes_base64_encoded: Option<String>,
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
    #[serde(rename = "raiFilteredReason", default)]
    pub rai_filtered_reason: Option<String>,
}
