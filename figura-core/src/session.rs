//! Session state
//!
//! Holds the selected input, the current phase and the outcome of the last
//! run. Only the orchestrator drives phase transitions; callers select or clear
//! input and observe snapshots.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::types::{ImagePayload, InputImage, PipelinePhase};

/// What an observer sees after every state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub phase: PipelinePhase,
    pub result: Option<ImagePayload>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<PipelineError>,
}

fn serialize_error<S: serde::Serializer>(
    error: &Option<PipelineError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeStruct;
    match error {
        None => serializer.serialize_none(),
        Some(error) => {
            let mut state = serializer.serialize_struct("PipelineError", 3)?;
            state.serialize_field("kind", &error.kind())?;
            state.serialize_field("status", &error.status_code())?;
            state.serialize_field("message", &error.message())?;
            state.end()
        }
    }
}

/// Receives every session transition, e.g. a UI state sink.
pub trait SessionObserver: Send + Sync {
    fn on_change(&self, snapshot: &SessionSnapshot);
}

impl<F> SessionObserver for F
where
    F: Fn(&SessionSnapshot) + Send + Sync,
{
    fn on_change(&self, snapshot: &SessionSnapshot) {
        self(snapshot)
    }
}

/// One user's pipeline state.
pub struct Session {
    id: Uuid,
    input: Option<InputImage>,
    phase: PipelinePhase,
    result: Option<ImagePayload>,
    error: Option<PipelineError>,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("input", &self.input)
            .field("phase", &self.phase)
            .field("result", &self.result)
            .field("error", &self.error)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            input: None,
            phase: PipelinePhase::Idle,
            result: None,
            error: None,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn input(&self) -> Option<&InputImage> {
        self.input.as_ref()
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    pub fn result(&self) -> Option<&ImagePayload> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            phase: self.phase,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }

    /// Replace the input wholesale and return to `Idle`.
    ///
    /// Also releases a session whose previous run was abandoned mid-flight.
    pub fn select_input(&mut self, image: InputImage) {
        self.input = Some(image);
        self.clear_outcome();
    }

    pub fn clear_input(&mut self) {
        self.input = None;
        self.clear_outcome();
    }

    /// Drop the last outcome but keep the input.
    pub fn reset(&mut self) {
        self.clear_outcome();
    }

    fn clear_outcome(&mut self) {
        self.result = None;
        self.error = None;
        self.transition(PipelinePhase::Idle);
    }

    pub(crate) fn begin_analyzing(&mut self) {
        self.result = None;
        self.error = None;
        self.transition(PipelinePhase::Analyzing);
    }

    pub(crate) fn begin_generating(&mut self) {
        debug_assert_eq!(self.phase, PipelinePhase::Analyzing);
        self.transition(PipelinePhase::Generating);
    }

    pub(crate) fn succeed(&mut self, image: ImagePayload) {
        debug_assert_eq!(self.phase, PipelinePhase::Generating);
        self.result = Some(image);
        self.error = None;
        self.transition(PipelinePhase::Succeeded);
    }

    pub(crate) fn fail(&mut self, error: PipelineError) {
        self.result = None;
        self.error = Some(error);
        self.transition(PipelinePhase::Failed);
    }

    fn transition(&mut self, phase: PipelinePhase) {
        tracing::debug!(session = %self.id, from = %self.phase, to = %phase, "phase change");
        self.phase = phase;
        if let Some(observer) = &self.observer {
            observer.on_change(&self.snapshot());
        }
    }
}
