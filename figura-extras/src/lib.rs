//! # Figura Extras
//!
//! Optional utilities for the `figura` pipeline:
//!
//! - **Telemetry** (`telemetry` feature, on by default): tracing subscriber
//!   setup with text or JSON output, to the console or a log file
//!
//! ```rust,ignore
//! let _guard = figura_extras::telemetry::init_from_env()?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

/// Telemetry and tracing utilities
#[cfg(feature = "telemetry")]
pub mod telemetry;

/// Error types for figura-extras
pub mod error;

pub use error::{ExtrasError, Result};
