//! Generation request builder
//!
//! Pure construction of outbound payloads from (image, style) or a prompt.
//! No network I/O happens here.

use crate::config::{ImageBackend, ProviderConfig};
use crate::error::PipelineError;
use crate::protocol::gemini::{GenerateContentRequest, Part, TEXT_AND_IMAGE};
use crate::protocol::imagen::PredictRequest;
use crate::types::{InputImage, StylePreset};

/// Fixed analytical template prefixed to the style text in two-stage runs.
pub const DEFAULT_ANALYSIS_TEMPLATE: &str = "You are an expert prompt writer for an image \
generation model. Study the attached photo and describe the main subject precisely: pose, \
facial expression, hairstyle, clothing, colors and any held objects. Then write one detailed \
image-generation prompt that recreates this subject as a collectible figure in the style \
described below. Reply with the prompt only, no preamble.\n\nTarget style: ";

/// Remote method a payload is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    GenerateContent,
    Predict,
}

impl Endpoint {
    pub const fn method(&self) -> &'static str {
        match self {
            Self::GenerateContent => "generateContent",
            Self::Predict => "predict",
        }
    }
}

/// A ready-to-send request body together with its target.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPayload {
    pub model: String,
    pub endpoint: Endpoint,
    pub body: serde_json::Value,
}

impl RequestPayload {
    /// `{base}/models/{model}:{method}`
    pub fn url(&self, base_url: &str) -> String {
        let model = self.model.trim_start_matches("models/");
        format!(
            "{}/models/{}:{}",
            base_url.trim_end_matches('/'),
            model,
            self.endpoint.method()
        )
    }
}

/// Builds analysis, generation and combined requests.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    analysis_template: String,
    analysis_model: String,
    image_model: String,
    image_backend: ImageBackend,
    sample_count: u32,
}

impl RequestBuilder {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            analysis_template: DEFAULT_ANALYSIS_TEMPLATE.to_string(),
            analysis_model: config.analysis_model.clone(),
            image_model: config.image_model.clone(),
            image_backend: config.image_backend,
            sample_count: config.sample_count.max(1),
        }
    }

    pub fn with_analysis_template(mut self, template: impl Into<String>) -> Self {
        self.analysis_template = template.into();
        self
    }

    /// Photo + analytical template + style description → multimodal request.
    pub fn build_analysis_request(
        &self,
        image: &InputImage,
        style: &StylePreset,
    ) -> Result<RequestPayload, PipelineError> {
        image.validate()?;
        style.validate()?;
        let instruction = format!("{}{}", self.analysis_template, style.instruction.trim());
        let body = GenerateContentRequest::from_parts(vec![
            Part::text(instruction),
            Part::inline_data(image.mime_type(), image.to_base64()),
        ]);
        self.generate_content(&self.analysis_model, &body)
    }

    /// Prompt from the analysis stage → text-only image generation request.
    pub fn build_generation_request(&self, prompt: &str) -> Result<RequestPayload, PipelineError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(PipelineError::InvalidInput(
                "generation prompt cannot be empty".into(),
            ));
        }
        match self.image_backend {
            ImageBackend::Imagen => Ok(RequestPayload {
                model: self.image_model.clone(),
                endpoint: Endpoint::Predict,
                body: serde_json::to_value(PredictRequest::new(prompt, self.sample_count))?,
            }),
            ImageBackend::Gemini => {
                let body = GenerateContentRequest::from_parts(vec![Part::text(prompt)])
                    .with_response_modalities(TEXT_AND_IMAGE);
                self.generate_content(&self.image_model, &body)
            }
        }
    }

    /// Single-stage: the style's fixed instruction with the photo, text and image output allowed.
    pub fn build_combined_request(
        &self,
        image: &InputImage,
        style: &StylePreset,
    ) -> Result<RequestPayload, PipelineError> {
        image.validate()?;
        style.validate()?;
        let body = GenerateContentRequest::from_parts(vec![
            Part::text(style.instruction.trim()),
            Part::inline_data(image.mime_type(), image.to_base64()),
        ])
        .with_response_modalities(TEXT_AND_IMAGE);
        let model = match self.image_backend {
            // Imagen cannot take a photo; the multimodal model renders directly.
            ImageBackend::Imagen => &self.analysis_model,
            ImageBackend::Gemini => &self.image_model,
        };
        self.generate_content(model, &body)
    }

    fn generate_content(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<RequestPayload, PipelineError> {
        Ok(RequestPayload {
            model: model.to_string(),
            endpoint: Endpoint::GenerateContent,
            body: serde_json::to_value(body)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image() -> InputImage {
        InputImage::new(vec![0, 0, 0], "image/png").unwrap()
    }

    fn style() -> StylePreset {
        StylePreset::new(1, "Chibi Stili", "cute chibi figure")
    }

    #[test]
    fn analysis_request_carries_template_style_and_image() {
        let builder = RequestBuilder::new(&ProviderConfig::new("k"))
            .with_analysis_template("Analyze. Style: ");
        let payload = builder.build_analysis_request(&image(), &style()).unwrap();

        assert_eq!(payload.endpoint, Endpoint::GenerateContent);
        assert_eq!(payload.model, crate::config::DEFAULT_ANALYSIS_MODEL);
        assert_eq!(
            payload.body,
            json!({
                "contents": [{
                    "parts": [
                        { "text": "Analyze. Style: cute chibi figure" },
                        { "inlineData": { "mimeType": "image/png", "data": "AAAA" } }
                    ]
                }]
            })
        );
    }

    #[test]
    fn imagen_generation_request_is_text_only_predict() {
        let builder = RequestBuilder::new(&ProviderConfig::new("k").with_sample_count(2));
        let payload = builder.build_generation_request("  prompt-X ").unwrap();
        assert_eq!(payload.endpoint, Endpoint::Predict);
        assert_eq!(
            payload.body,
            json!({ "instances": [{ "prompt": "prompt-X" }], "parameters": { "sampleCount": 2 } })
        );
        assert_eq!(
            payload.url("http://localhost:1234/"),
            "http://localhost:1234/models/imagen-3.0-generate-002:predict"
        );
    }

    #[test]
    fn gemini_generation_request_asks_for_images() {
        let config = ProviderConfig::new("k").with_image_backend(ImageBackend::Gemini);
        let payload = RequestBuilder::new(&config)
            .build_generation_request("prompt-X")
            .unwrap();
        assert_eq!(payload.endpoint, Endpoint::GenerateContent);
        assert_eq!(
            payload.body["generationConfig"]["responseModalities"],
            json!(["TEXT", "IMAGE"])
        );
        assert!(payload.body["contents"][0]["parts"][0]["inlineData"].is_null());
    }

    #[test]
    fn combined_request_embeds_fixed_instruction() {
        let payload = RequestBuilder::new(&ProviderConfig::new("k"))
            .build_combined_request(&image(), &style())
            .unwrap();
        assert_eq!(payload.body["contents"][0]["parts"][0]["text"], "cute chibi figure");
        assert_eq!(
            payload.body["contents"][0]["parts"][1]["inlineData"]["data"],
            "AAAA"
        );
        assert_eq!(
            payload.body["generationConfig"]["responseModalities"],
            json!(["TEXT", "IMAGE"])
        );
    }

    #[test]
    fn malformed_inputs_are_validation_errors() {
        let builder = RequestBuilder::new(&ProviderConfig::new("k"));
        let blank_style = StylePreset::new(9, "Blank", "");
        let err = builder
            .build_analysis_request(&image(), &blank_style)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);

        let err = builder.build_generation_request("   ").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }
}
