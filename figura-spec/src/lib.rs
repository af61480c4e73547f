//! figura-spec
//!
//! Provider-agnostic data model and error taxonomy for figura.
//! This crate is intentionally dependency-light and shared across crates.

pub mod error;
pub mod types;

pub use error::{ErrorKind, ErrorSummary, PipelineError, summarize_error};
pub use types::{ImagePayload, InputImage, PipelinePhase, StyleCatalog, StylePreset};
