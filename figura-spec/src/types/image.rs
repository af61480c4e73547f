//! Image payloads flowing in and out of the pipeline.

use std::path::Path;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// The user's photo: raw bytes plus MIME type.
///
/// Owned by exactly one session and replaced wholesale when a new file is picked.
#[derive(Clone, PartialEq, Eq)]
pub struct InputImage {
    bytes: Vec<u8>,
    mime_type: String,
}

impl std::fmt::Debug for InputImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputImage")
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

impl InputImage {
    /// Create an input image from bytes and an explicit MIME type.
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Result<Self, PipelineError> {
        let image = Self {
            bytes,
            mime_type: mime_type.into().trim().to_ascii_lowercase(),
        };
        image.validate()?;
        Ok(image)
    }

    /// Create an input image, sniffing the MIME type from magic bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PipelineError> {
        let mime = sniff_mime(&bytes).ok_or_else(|| {
            PipelineError::InvalidInput("could not detect an image type from the data".into())
        })?;
        Self::new(bytes, mime)
    }

    /// Decode a standard base64 payload as delivered by a file reader.
    pub fn from_base64(data: &str, mime_type: impl Into<String>) -> Result<Self, PipelineError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| PipelineError::InvalidInput(format!("invalid base64 image data: {e}")))?;
        Self::new(bytes, mime_type)
    }

    /// Parse a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self, PipelineError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| PipelineError::InvalidInput("not a data URL".into()))?;
        let (meta, data) = rest
            .split_once(',')
            .ok_or_else(|| PipelineError::InvalidInput("data URL has no payload".into()))?;
        let mime = meta.strip_suffix(";base64").ok_or_else(|| {
            PipelineError::InvalidInput("only base64 data URLs are supported".into())
        })?;
        Self::from_base64(data, mime)
    }

    /// Read an image file. MIME comes from magic bytes, falling back to the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            PipelineError::InvalidInput(format!("failed to read {}: {e}", path.display()))
        })?;
        let mime = sniff_mime(&bytes)
            .map(str::to_string)
            .or_else(|| {
                mime_guess::from_path(path)
                    .first()
                    .map(|m| m.essence_str().to_string())
            })
            .ok_or_else(|| {
                PipelineError::InvalidInput(format!(
                    "could not determine the image type of {}",
                    path.display()
                ))
            })?;
        Self::new(bytes, mime)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Standard-alphabet base64 of the bytes, as sent inline to the model.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.bytes.is_empty() {
            return Err(PipelineError::InvalidInput("image payload is empty".into()));
        }
        if !self.mime_type.starts_with("image/") {
            return Err(PipelineError::InvalidInput(format!(
                "unsupported MIME type '{}'",
                self.mime_type
            )));
        }
        Ok(())
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes)
        .map(|t| t.mime_type())
        .filter(|m| m.starts_with("image/"))
}

/// A generated image: base64 data plus its declared MIME type.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub data: String,
    pub mime_type: String,
}

impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("data_len", &self.data.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

impl ImagePayload {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Decode the base64 data into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>, PipelineError> {
        Ok(base64::engine::general_purpose::STANDARD.decode(self.data.trim())?)
    }

    /// File extension to use when saving the image.
    pub fn file_extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG
    const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    #[test]
    fn empty_bytes_are_invalid() {
        let err = InputImage::new(Vec::new(), "image/png").unwrap_err();
        assert_eq!(err, PipelineError::InvalidInput("image payload is empty".into()));
    }

    #[test]
    fn non_image_mime_is_invalid() {
        assert!(InputImage::new(vec![1, 2, 3], "application/pdf").is_err());
    }

    #[test]
    fn sniffs_png_from_bytes() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(PNG_1X1)
            .unwrap();
        let image = InputImage::from_bytes(bytes).unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.to_base64(), PNG_1X1);
    }

    #[test]
    fn parses_data_url() {
        let image = InputImage::from_data_url(&format!("data:image/png;base64,{PNG_1X1}")).unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert!(!image.is_empty());

        assert!(InputImage::from_data_url("image/png;base64,AAAA").is_err());
        assert!(InputImage::from_data_url("data:image/png,AAAA").is_err());
    }

    #[tokio::test]
    async fn reads_from_path_with_extension_fallback() {
        let dir = tempfile::tempdir().unwrap();
        // Bytes without a recognizable signature: MIME comes from the extension
        let path = dir.path().join("photo.jpg");
        tokio::fs::write(&path, b"not-really-a-jpeg").await.unwrap();
        let image = InputImage::from_path(&path).await.unwrap();
        assert_eq!(image.mime_type(), "image/jpeg");
        assert_eq!(image.len(), 17);

        let missing = InputImage::from_path(dir.path().join("nope.png")).await;
        assert!(matches!(missing, Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn payload_decodes_and_names_extension() {
        let payload = ImagePayload::new("AAAA", "image/png");
        assert_eq!(payload.decode().unwrap(), vec![0, 0, 0]);
        assert_eq!(payload.file_extension(), "png");
        assert_eq!(ImagePayload::new("", "image/jpeg").file_extension(), "jpg");
        assert!(ImagePayload::new("***", "image/png").decode().is_err());
    }
}
