//! Provider wire protocols (Gemini generateContent, Imagen predict).

pub mod gemini;
pub mod imagen;

pub use gemini::{Blob, Content, GenerateContentRequest, GenerationConfig, Part};
pub use imagen::{PredictRequest, Prediction};
