//! figura-core
//!
//! Resilient generation pipeline: backoff executor, request building,
//! response extraction, transport, session state and orchestration.
#![deny(unsafe_code)]

pub mod config;
pub mod extract;
pub mod pipeline;
pub mod protocol;
pub mod request;
pub mod retry;
pub mod retry_api;
pub mod session;
pub mod transport;

pub use figura_spec::{error, types};

pub use config::{ImageBackend, PipelineConfig, ProviderConfig, StageCount};
pub use error::{ErrorKind, PipelineError};
pub use extract::{GeminiExtractor, ResponseExtractor};
pub use pipeline::{Orchestrator, RunOutcome, RunReport, Stage, StageRetry};
pub use request::{Endpoint, RequestBuilder, RequestPayload};
pub use retry::{RetryEvent, RetryExecutor, RetryPolicy};
pub use session::{Session, SessionObserver, SessionSnapshot};
pub use transport::{HttpTransport, Transport};
