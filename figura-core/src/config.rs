//! Provider and pipeline configuration
//!
//! Defaults target the public Gemini API. Every value can be overridden
//! programmatically or from `FIGURA_*` environment variables.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-2.5-flash-preview-09-2025";
pub const DEFAULT_IMAGEN_MODEL: &str = "imagen-3.0-generate-002";
pub const DEFAULT_GEMINI_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which model family renders the final image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageBackend {
    /// Dedicated image model via `:predict`
    #[default]
    Imagen,
    /// Image-capable Gemini model via `:generateContent`
    Gemini,
}

/// Number of remote calls per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCount {
    /// One combined call: style instruction + photo, text and image output allowed
    Single,
    /// Analyze the photo into a prompt, then generate from the prompt
    #[default]
    Two,
}

impl StageCount {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "single" | "one" => Some(Self::Single),
            "2" | "two" => Some(Self::Two),
            _ => None,
        }
    }
}

/// Remote provider settings
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// API key for authentication
    pub api_key: SecretString,
    /// Base URL for the Gemini API
    pub base_url: String,
    /// Multimodal model used for analysis (and single-stage generation)
    pub analysis_model: String,
    /// Model used for the generation stage
    pub image_model: String,
    pub image_backend: ImageBackend,
    /// Imagen `sampleCount`
    pub sample_count: u32,
    /// Timeout applied to each individual attempt
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: SecretString::from(String::new()),
            base_url: DEFAULT_BASE_URL.to_string(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            image_model: DEFAULT_IMAGEN_MODEL.to_string(),
            image_backend: ImageBackend::Imagen,
            sample_count: 1,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_analysis_model(mut self, model: impl Into<String>) -> Self {
        self.analysis_model = model.into();
        self
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    /// Switch backend; the image model follows unless it was customised.
    pub fn with_image_backend(mut self, backend: ImageBackend) -> Self {
        if self.image_model == DEFAULT_IMAGEN_MODEL || self.image_model == DEFAULT_GEMINI_IMAGE_MODEL
        {
            self.image_model = match backend {
                ImageBackend::Imagen => DEFAULT_IMAGEN_MODEL,
                ImageBackend::Gemini => DEFAULT_GEMINI_IMAGE_MODEL,
            }
            .to_string();
        }
        self.image_backend = backend;
        self
    }

    pub const fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }

    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Defaults overlaid with the environment.
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::default().apply_env()
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
    }

    /// Overlay values from `GEMINI_API_KEY` and `FIGURA_*` variables.
    ///
    /// An explicitly configured API key wins over the environment.
    pub fn apply_env(mut self) -> Result<Self, PipelineError> {
        if !self.has_api_key()
            && let Ok(key) = std::env::var("GEMINI_API_KEY")
        {
            self.api_key = SecretString::from(key);
        }
        if let Ok(url) = std::env::var("FIGURA_BASE_URL") {
            self = self.with_base_url(url);
        }
        if let Ok(model) = std::env::var("FIGURA_ANALYSIS_MODEL") {
            self.analysis_model = model;
        }
        if let Ok(backend) = std::env::var("FIGURA_IMAGE_BACKEND") {
            let backend = match backend.trim().to_ascii_lowercase().as_str() {
                "imagen" => ImageBackend::Imagen,
                "gemini" => ImageBackend::Gemini,
                other => {
                    return Err(PipelineError::InvalidInput(format!(
                        "FIGURA_IMAGE_BACKEND must be 'imagen' or 'gemini', got '{other}'"
                    )));
                }
            };
            self = self.with_image_backend(backend);
        }
        if let Ok(model) = std::env::var("FIGURA_IMAGE_MODEL") {
            self.image_model = model;
        }
        if let Ok(secs) = std::env::var("FIGURA_TIMEOUT_SECS") {
            let secs = parse_env_number::<u64>("FIGURA_TIMEOUT_SECS", &secs)?;
            self.request_timeout = Duration::from_secs(secs);
        }
        Ok(self)
    }

    /// Check static settings. The API key is checked per run instead.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.base_url.trim().is_empty() {
            return Err(PipelineError::InvalidInput("base URL cannot be empty".into()));
        }
        if self.analysis_model.trim().is_empty() || self.image_model.trim().is_empty() {
            return Err(PipelineError::InvalidInput("model names cannot be empty".into()));
        }
        if self.sample_count == 0 {
            return Err(PipelineError::InvalidInput("sample count must be at least 1".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(PipelineError::InvalidInput("request timeout must be positive".into()));
        }
        Ok(())
    }
}

/// Orchestration settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub stages: StageCount,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl PipelineConfig {
    pub fn new(stages: StageCount, retry: RetryPolicy) -> Self {
        Self { stages, retry }
    }

    pub fn from_env() -> Result<Self, PipelineError> {
        Self::default().apply_env()
    }

    /// Overlay `FIGURA_STAGES`, `FIGURA_MAX_ATTEMPTS` and `FIGURA_BASE_DELAY_MS`.
    pub fn apply_env(mut self) -> Result<Self, PipelineError> {
        if let Ok(stages) = std::env::var("FIGURA_STAGES") {
            self.stages = StageCount::parse(&stages).ok_or_else(|| {
                PipelineError::InvalidInput(format!("FIGURA_STAGES must be 1 or 2, got '{stages}'"))
            })?;
        }
        if let Ok(attempts) = std::env::var("FIGURA_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse_env_number("FIGURA_MAX_ATTEMPTS", &attempts)?;
        }
        if let Ok(delay) = std::env::var("FIGURA_BASE_DELAY_MS") {
            let millis = parse_env_number::<u64>("FIGURA_BASE_DELAY_MS", &delay)?;
            self.retry.base_delay = Duration::from_millis(millis);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        self.retry.validate()
    }
}

fn parse_env_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, PipelineError> {
    raw.trim()
        .parse()
        .map_err(|_| PipelineError::InvalidInput(format!("{name} must be a number, got '{raw}'")))
}
