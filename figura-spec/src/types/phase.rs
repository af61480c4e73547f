use serde::{Deserialize, Serialize};

/// Where a session currently stands in the pipeline.
///
/// `Idle` is initial; `Succeeded` and `Failed` are terminal for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PipelinePhase {
    #[default]
    Idle,
    Analyzing,
    Generating,
    Succeeded,
    Failed,
}

impl PipelinePhase {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// A run is in flight.
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Analyzing | Self::Generating)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Analyzing => "analyzing",
            Self::Generating => "generating",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
