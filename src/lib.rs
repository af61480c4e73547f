//! # Figura
//!
//! Turn a photo into a stylized collectible-figure image through a resilient
//! generative-model pipeline.
//!
//! ## Features
//!
//! - **Two-stage or single-stage**: analyze the photo into a prompt and render it
//!   with a dedicated image model, or let one multimodal call do both.
//! - **Deterministic backoff**: transient failures (HTTP 429, 5xx, transport
//!   errors, timeouts) are retried with `base_delay * 2^attempt`; permanent
//!   errors fail fast.
//! - **Defensive extraction**: provider responses are decoded as optional parts;
//!   a text-only answer to an image request is a failure, never an empty image.
//! - **Observable sessions**: every phase change is published to an optional
//!   [`SessionObserver`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use figura::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Figura::builder().api_key("your-api-key").build()?;
//!
//!     let mut session = Session::new();
//!     session.select_input(InputImage::from_path("me.jpg").await?);
//!
//!     let catalog = StyleCatalog::builtin();
//!     orchestrator.run(&mut session, catalog.get(1)).await;
//!     if let Some(image) = session.result() {
//!         std::fs::write("figure.png", image.decode()?)?;
//!     }
//!     Ok(())
//! }
//! ```
#![deny(unsafe_code)]

use std::time::Duration;

use secrecy::SecretString;

pub use figura_core::{
    config, extract, pipeline, protocol, request, retry, retry_api, session, transport,
};
pub use figura_spec::{error, types};

/// Tracing subscriber setup.
pub use figura_extras::{ExtrasError, telemetry};

use figura_core::{
    HttpTransport, ImageBackend, Orchestrator, PipelineConfig, ProviderConfig, RequestBuilder,
    RetryPolicy, StageCount,
};
use figura_spec::PipelineError;

/// Commonly used types.
pub mod prelude {
    pub use crate::{Figura, FiguraBuilder};
    pub use figura_core::{
        ErrorKind, GeminiExtractor, HttpTransport, ImageBackend, Orchestrator, PipelineConfig,
        PipelineError, ProviderConfig, RequestBuilder, ResponseExtractor, RetryExecutor,
        RetryPolicy, RunOutcome, RunReport, Session, SessionObserver, SessionSnapshot, Stage,
        StageCount, Transport,
    };
    pub use figura_spec::{
        ImagePayload, InputImage, PipelinePhase, StyleCatalog, StylePreset, summarize_error,
    };
}

pub use figura_core::{RunOutcome, RunReport, Session, SessionObserver};

/// Entry point for building an HTTP-backed [`Orchestrator`].
pub struct Figura;

impl Figura {
    pub fn builder() -> FiguraBuilder {
        FiguraBuilder::default()
    }
}

/// Builder for an [`Orchestrator<HttpTransport>`].
///
/// Nothing is read from the environment unless the builder was created with
/// [`FiguraBuilder::from_env`].
#[derive(Debug, Clone, Default)]
pub struct FiguraBuilder {
    provider: ProviderConfig,
    pipeline: PipelineConfig,
    analysis_template: Option<String>,
    http_client: Option<reqwest::Client>,
}

impl FiguraBuilder {
    /// Seed provider and pipeline settings from `GEMINI_API_KEY` and `FIGURA_*`.
    ///
    /// Setters called afterwards override the environment.
    pub fn from_env() -> Result<Self, PipelineError> {
        Ok(Self {
            provider: ProviderConfig::from_env()?,
            pipeline: PipelineConfig::from_env()?,
            ..Self::default()
        })
    }

    /// Set the API key
    pub fn api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.provider.api_key = SecretString::from(api_key.into());
        self
    }

    /// Set the base URL
    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.provider = self.provider.with_base_url(base_url);
        self
    }

    pub fn analysis_model<S: Into<String>>(mut self, model: S) -> Self {
        self.provider = self.provider.with_analysis_model(model);
        self
    }

    pub fn image_model<S: Into<String>>(mut self, model: S) -> Self {
        self.provider = self.provider.with_image_model(model);
        self
    }

    pub fn image_backend(mut self, backend: ImageBackend) -> Self {
        self.provider = self.provider.with_image_backend(backend);
        self
    }

    /// Imagen `sampleCount`
    pub const fn sample_count(mut self, count: u32) -> Self {
        self.provider.sample_count = count;
        self
    }

    /// Per-attempt request timeout
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.provider.request_timeout = timeout;
        self
    }

    pub const fn stages(mut self, stages: StageCount) -> Self {
        self.pipeline.stages = stages;
        self
    }

    pub const fn single_stage(self) -> Self {
        self.stages(StageCount::Single)
    }

    pub const fn retry(mut self, policy: RetryPolicy) -> Self {
        self.pipeline.retry = policy;
        self
    }

    pub const fn max_attempts(mut self, attempts: u32) -> Self {
        self.pipeline.retry.max_attempts = attempts;
        self
    }

    pub const fn base_delay(mut self, delay: Duration) -> Self {
        self.pipeline.retry.base_delay = delay;
        self
    }

    /// Replace the analytical template prefixed to the style text.
    pub fn analysis_template<S: Into<String>>(mut self, template: S) -> Self {
        self.analysis_template = Some(template.into());
        self
    }

    /// Set custom HTTP client
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn provider_config(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn pipeline_config(&self) -> &PipelineConfig {
        &self.pipeline
    }

    /// Validate settings and assemble the orchestrator.
    ///
    /// A missing API key is not an error here; runs fail with a validation
    /// error before any request is sent.
    pub fn build(self) -> Result<Orchestrator<HttpTransport>, PipelineError> {
        self.provider.validate()?;
        self.pipeline.validate()?;

        let mut builder = RequestBuilder::new(&self.provider);
        if let Some(template) = self.analysis_template {
            builder = builder.with_analysis_template(template);
        }
        let transport = match self.http_client {
            Some(client) => HttpTransport::with_http_client(&self.provider, client),
            None => HttpTransport::new(&self.provider)?,
        };
        tracing::debug!(
            base_url = %transport.base_url(),
            stages = ?self.pipeline.stages,
            max_attempts = self.pipeline.retry.max_attempts,
            "orchestrator built"
        );
        Ok(Orchestrator::new(self.pipeline, builder, transport))
    }
}
