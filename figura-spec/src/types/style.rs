//! Style presets
//!
//! A preset names a figure style and carries the instruction text sent to the
//! model. Presets are fixed when the catalog is built and never mutated.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// A named figure-generation style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StylePreset {
    pub id: u32,
    pub title: String,
    /// Descriptive instruction text for this style
    pub instruction: String,
}

impl StylePreset {
    pub fn new(id: u32, title: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            instruction: instruction.into(),
        }
    }

    /// Reject presets that would produce an empty instruction.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.title.trim().is_empty() {
            return Err(PipelineError::InvalidInput(format!(
                "style {} has an empty title",
                self.id
            )));
        }
        if self.instruction.trim().is_empty() {
            return Err(PipelineError::InvalidInput(format!(
                "style {} ({}) has no instruction text",
                self.id, self.title
            )));
        }
        Ok(())
    }
}

/// Ordered, immutable set of presets.
///
/// Iteration order is declaration order; ids are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleCatalog {
    presets: Vec<StylePreset>,
}

impl StyleCatalog {
    /// Build a catalog, rejecting duplicate ids and malformed presets.
    pub fn new(presets: Vec<StylePreset>) -> Result<Self, PipelineError> {
        for (idx, preset) in presets.iter().enumerate() {
            preset.validate()?;
            if presets[..idx].iter().any(|p| p.id == preset.id) {
                return Err(PipelineError::InvalidInput(format!(
                    "duplicate style id {}",
                    preset.id
                )));
            }
        }
        Ok(Self { presets })
    }

    /// The presets shipped with the application.
    pub fn builtin() -> Self {
        Self {
            presets: vec![
                StylePreset::new(
                    1,
                    "Chibi Stili",
                    "Render the subject as a cute chibi collectible figure: oversized head, \
                     small body, big expressive eyes, soft pastel shading, glossy vinyl finish, \
                     standing on a round display base.",
                ),
                StylePreset::new(
                    2,
                    "Action Figure",
                    "Render the subject as a 1/12 scale articulated action figure with visible \
                     joints, sculpted clothing folds and a blister-pack retail box behind it.",
                ),
                StylePreset::new(
                    3,
                    "Claymation",
                    "Render the subject as a handmade plasticine stop-motion character with \
                     fingerprint texture, slightly uneven edges and warm studio lighting.",
                ),
                StylePreset::new(
                    4,
                    "Resin Statue",
                    "Render the subject as a premium painted resin statue on a sculpted \
                     diorama base, dramatic pose, museum-style spot lighting.",
                ),
                StylePreset::new(
                    5,
                    "Pixel Figurine",
                    "Render the subject as a voxel/pixel-art desk figurine built from small \
                     cubes with a limited retro color palette.",
                ),
            ],
        }
    }

    pub fn get(&self, id: u32) -> Option<&StylePreset> {
        self.presets.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StylePreset> {
        self.presets.iter()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

impl Default for StyleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
