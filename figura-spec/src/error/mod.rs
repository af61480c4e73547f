//! Error Handling Module
//!
//! - Core error types (`PipelineError`, `ErrorKind`)
//! - User-facing error summaries
//! - Conversions from common foreign error types

mod conversions;
pub mod helpers;
pub mod types;

pub use helpers::*;
pub use types::*;
