//! Data model shared by the pipeline and its callers.

mod image;
mod phase;
mod style;

pub use image::{ImagePayload, InputImage};
pub use phase::PipelinePhase;
pub use style::{StyleCatalog, StylePreset};
