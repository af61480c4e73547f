//! Pipeline orchestrator
//!
//! Drives one session through `Idle → Analyzing → Generating → Succeeded`,
//! with `Failed` reachable from validation or either stage. Single-stage and
//! two-stage flows share this one state machine; [`StageCount`] selects
//! between them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::Instrument;

use crate::config::{PipelineConfig, StageCount};
use crate::error::PipelineError;
use crate::extract::{GeminiExtractor, ResponseExtractor};
use crate::request::{RequestBuilder, RequestPayload};
use crate::retry::{RetryEvent, RetryExecutor};
use crate::session::Session;
use crate::transport::Transport;
use crate::types::{ImagePayload, InputImage, PipelinePhase, StylePreset};

/// Remote stage a retry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Analysis,
    Generation,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Analysis => "analysis",
            Self::Generation => "generation",
        })
    }
}

/// A backoff sleep taken during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRetry {
    pub stage: Stage,
    /// 0-based attempt that failed
    pub attempt: u32,
    pub delay: Duration,
    pub error: PipelineError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Terminal phase of the run
    pub phase: PipelinePhase,
    pub retries: Vec<StageRetry>,
    /// Prompt produced by the analysis stage, if any
    pub prompt: Option<String>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(RunReport),
    /// The session already had a run in flight; nothing changed.
    Ignored,
}

impl RunOutcome {
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Ignored => None,
        }
    }
}

/// Orchestrates request building, retried transport calls and extraction.
pub struct Orchestrator<T: Transport> {
    config: PipelineConfig,
    builder: RequestBuilder,
    extractor: Arc<dyn ResponseExtractor>,
    transport: T,
    executor: RetryExecutor,
}

impl<T: Transport> std::fmt::Debug for Orchestrator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("builder", &self.builder)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Orchestrator<T> {
    pub fn new(config: PipelineConfig, builder: RequestBuilder, transport: T) -> Self {
        Self {
            executor: RetryExecutor::new(config.retry),
            config,
            builder,
            extractor: Arc::new(GeminiExtractor),
            transport,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ResponseExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run the pipeline for `session`.
    ///
    /// Returns [`RunOutcome::Ignored`] without touching the session when a
    /// previous run is still marked in flight. Otherwise the session ends in
    /// `Succeeded` or `Failed` and the report describes how it got there.
    pub async fn run(&self, session: &mut Session, style: Option<&StylePreset>) -> RunOutcome {
        if session.phase().is_active() {
            tracing::debug!(session = %session.id(), phase = %session.phase(), "run ignored, previous run in flight");
            return RunOutcome::Ignored;
        }

        let span = tracing::info_span!(
            "pipeline_run",
            session = %session.id(),
            stages = ?self.config.stages,
            style = style.map(|s| s.id),
        );
        async move {
            tracing::info!("run started");
            let started = Instant::now();
            let mut retries = Vec::new();
            let mut prompt = None;

            match self
                .run_stages(session, style, &mut retries, &mut prompt)
                .await
            {
                Ok(image) => session.succeed(image),
                Err(error) => {
                    tracing::warn!(kind = %error.kind(), error = %error, "run failed");
                    session.fail(error);
                }
            }

            let report = RunReport {
                phase: session.phase(),
                retries,
                prompt,
                elapsed: started.elapsed(),
            };
            tracing::info!(
                phase = %report.phase,
                retries = report.retries.len(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "run finished"
            );
            RunOutcome::Completed(report)
        }
        .instrument(span)
        .await
    }

    /// Analysis stage only: photo + style → generation prompt.
    pub async fn analyze(
        &self,
        image: &InputImage,
        style: &StylePreset,
    ) -> Result<String, PipelineError> {
        self.config.validate()?;
        self.transport.ensure_credential()?;
        let payload = self.builder.build_analysis_request(image, style)?;
        let raw = self
            .execute(Stage::Analysis, &payload, &mut Vec::new())
            .await?;
        self.extractor.extract_text(&raw)
    }

    /// Full run on a throwaway session.
    pub async fn generate(
        &self,
        image: &InputImage,
        style: &StylePreset,
    ) -> Result<ImagePayload, PipelineError> {
        let mut session = Session::new();
        session.select_input(image.clone());
        self.run(&mut session, Some(style)).await;
        match (session.result(), session.error()) {
            (Some(result), _) => Ok(result.clone()),
            (None, Some(error)) => Err(error.clone()),
            (None, None) => Err(PipelineError::InvalidInput(
                "run ended without a result".into(),
            )),
        }
    }

    async fn run_stages(
        &self,
        session: &mut Session,
        style: Option<&StylePreset>,
        retries: &mut Vec<StageRetry>,
        prompt: &mut Option<String>,
    ) -> Result<ImagePayload, PipelineError> {
        let image = session
            .input()
            .cloned()
            .ok_or_else(|| PipelineError::InvalidInput("no input image selected".into()))?;
        let style = style.ok_or_else(|| PipelineError::InvalidInput("no style selected".into()))?;
        self.config.validate()?;
        self.transport.ensure_credential()?;

        session.begin_analyzing();
        let generation = match self.config.stages {
            StageCount::Two => {
                let analysis = self.builder.build_analysis_request(&image, style)?;
                let raw = self.execute(Stage::Analysis, &analysis, retries).await?;
                let text = self.extractor.extract_text(&raw)?;
                tracing::debug!(prompt_chars = text.chars().count(), "analysis produced a prompt");
                let request = self.builder.build_generation_request(&text)?;
                *prompt = Some(text);
                request
            }
            StageCount::Single => self.builder.build_combined_request(&image, style)?,
        };

        session.begin_generating();
        let raw = self.execute(Stage::Generation, &generation, retries).await?;
        self.extractor.extract_image(&raw)
    }

    async fn execute(
        &self,
        stage: Stage,
        payload: &RequestPayload,
        retries: &mut Vec<StageRetry>,
    ) -> Result<Value, PipelineError> {
        self.executor
            .execute_observed(
                || self.transport.send(payload),
                |event: &RetryEvent| {
                    tracing::warn!(
                        stage = %stage,
                        attempt = event.attempt + 1,
                        delay_ms = event.delay.as_millis() as u64,
                        error = %event.error,
                        "transient failure, backing off"
                    );
                    retries.push(StageRetry {
                        stage,
                        attempt: event.attempt,
                        delay: event.delay,
                        error: event.error.clone(),
                    });
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::error::ErrorKind;
    use crate::request::Endpoint;
    use crate::retry::RetryPolicy;
    use crate::session::{SessionObserver, SessionSnapshot};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<Value, PipelineError>>>,
        sent: Mutex<Vec<RequestPayload>>,
        no_credential: bool,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<Value, PipelineError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<RequestPayload> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, payload: &RequestPayload) -> Result<Value, PipelineError> {
            self.sent.lock().unwrap().push(payload.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(PipelineError::api_error(400, "script exhausted")))
        }

        fn ensure_credential(&self) -> Result<(), PipelineError> {
            if self.no_credential {
                return Err(PipelineError::MissingCredential("no key".into()));
            }
            Ok(())
        }
    }

    fn text_response(text: &str) -> Value {
        json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
    }

    fn predict_response(data: &str) -> Value {
        json!({ "predictions": [{ "bytesBase64Encoded": data }] })
    }

    fn orchestrator(
        stages: StageCount,
        responses: Vec<Result<Value, PipelineError>>,
    ) -> Orchestrator<ScriptedTransport> {
        Orchestrator::new(
            PipelineConfig::new(stages, RetryPolicy::default()),
            RequestBuilder::new(&ProviderConfig::new("k")),
            ScriptedTransport::new(responses),
        )
    }

    fn session_with_input() -> Session {
        let mut session = Session::new();
        session.select_input(InputImage::new(b"IMG".to_vec(), "image/jpeg").unwrap());
        session
    }

    fn chibi() -> StylePreset {
        StylePreset::new(1, "Chibi Stili", "cute chibi collectible figure")
    }

    fn report(outcome: RunOutcome) -> RunReport {
        match outcome {
            RunOutcome::Completed(report) => report,
            RunOutcome::Ignored => panic!("run was ignored"),
        }
    }

    #[tokio::test]
    async fn two_stage_run_succeeds() {
        let orchestrator = orchestrator(
            StageCount::Two,
            vec![Ok(text_response("prompt-X")), Ok(predict_response("AAAA"))],
        );
        let mut session = session_with_input();

        let report = report(orchestrator.run(&mut session, Some(&chibi())).await);

        assert_eq!(report.phase, PipelinePhase::Succeeded);
        assert_eq!(report.prompt.as_deref(), Some("prompt-X"));
        assert!(report.retries.is_empty());
        assert_eq!(session.result(), Some(&ImagePayload::new("AAAA", "image/png")));
        assert!(session.error().is_none());

        let sent = orchestrator.transport().sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].endpoint, Endpoint::GenerateContent);
        assert_eq!(sent[0].body["contents"][0]["parts"][1]["inlineData"]["data"], "SU1H");
        assert_eq!(sent[1].endpoint, Endpoint::Predict);
        assert_eq!(sent[1].body["instances"][0]["prompt"], "prompt-X");
    }

    #[tokio::test(start_paused = true)]
    async fn transient_generation_failures_are_retried() {
        let orchestrator = orchestrator(
            StageCount::Two,
            vec![
                Ok(text_response("prompt-X")),
                Err(PipelineError::api_error(503, "unavailable")),
                Err(PipelineError::api_error(503, "unavailable")),
                Ok(predict_response("AAAA")),
            ],
        );
        let mut session = session_with_input();

        let report = report(orchestrator.run(&mut session, Some(&chibi())).await);

        assert_eq!(report.phase, PipelinePhase::Succeeded);
        assert_eq!(report.retries.len(), 2);
        assert!(report.retries.iter().all(|r| r.stage == Stage::Generation));
        let delays: Vec<_> = report.retries.iter().map(|r| r.delay).collect();
        assert_eq!(delays, vec![Duration::from_millis(1000), Duration::from_millis(2000)]);
        assert_eq!(orchestrator.transport().sent().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_fail_the_run_with_last_error() {
        let responses = (0..5)
            .map(|i| Err(PipelineError::api_error(503, format!("busy {i}"))))
            .collect();
        let orchestrator = orchestrator(StageCount::Single, responses);
        let mut session = session_with_input();

        let report = report(orchestrator.run(&mut session, Some(&chibi())).await);

        assert_eq!(report.phase, PipelinePhase::Failed);
        assert_eq!(report.retries.len(), 4);
        assert_eq!(orchestrator.transport().sent().len(), 5);
        let error = session.error().unwrap();
        assert_eq!(error.kind(), ErrorKind::Transient);
        assert_eq!(error.message(), "busy 4");
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_fails_after_one_attempt() {
        let orchestrator = orchestrator(
            StageCount::Two,
            vec![Err(PipelineError::api_error(400, "bad request"))],
        );
        let mut session = session_with_input();
        let started = tokio::time::Instant::now();

        let report = report(orchestrator.run(&mut session, Some(&chibi())).await);

        assert_eq!(report.phase, PipelinePhase::Failed);
        assert!(report.retries.is_empty());
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(orchestrator.transport().sent().len(), 1);
        assert_eq!(session.error().unwrap().kind(), ErrorKind::Permanent);
    }

    #[tokio::test]
    async fn text_only_generation_is_permanent_failure() {
        let orchestrator = orchestrator(
            StageCount::Two,
            vec![
                Ok(text_response("prompt-X")),
                Ok(text_response("I cannot create that image.")),
            ],
        );
        let mut session = session_with_input();

        orchestrator.run(&mut session, Some(&chibi())).await;

        assert_eq!(session.phase(), PipelinePhase::Failed);
        assert!(session.result().is_none());
        assert!(matches!(session.error(), Some(PipelineError::ImageDeclined(_))));
        assert_eq!(session.error().unwrap().kind(), ErrorKind::Permanent);
    }

    #[tokio::test]
    async fn empty_analysis_stops_before_generation() {
        let orchestrator = orchestrator(StageCount::Two, vec![Ok(text_response("   "))]);
        let mut session = session_with_input();

        let report = report(orchestrator.run(&mut session, Some(&chibi())).await);

        assert_eq!(report.phase, PipelinePhase::Failed);
        assert_eq!(report.prompt, None);
        assert_eq!(session.error(), Some(&PipelineError::EmptyAnalysis));
        assert_eq!(orchestrator.transport().sent().len(), 1);
    }

    #[tokio::test]
    async fn validation_failures_make_no_network_call() {
        let orchestrator = orchestrator(StageCount::Two, vec![]);

        let mut no_input = Session::new();
        orchestrator.run(&mut no_input, Some(&chibi())).await;
        assert_eq!(no_input.phase(), PipelinePhase::Failed);
        assert_eq!(no_input.error().unwrap().kind(), ErrorKind::Validation);

        let mut no_style = session_with_input();
        orchestrator.run(&mut no_style, None).await;
        assert_eq!(no_style.error().unwrap().kind(), ErrorKind::Validation);

        assert!(orchestrator.transport().sent().is_empty());
    }

    #[tokio::test]
    async fn missing_credential_fails_before_any_request() {
        let orchestrator = Orchestrator::new(
            PipelineConfig::default(),
            RequestBuilder::new(&ProviderConfig::default()),
            ScriptedTransport {
                no_credential: true,
                ..Default::default()
            },
        );
        let mut session = session_with_input();

        orchestrator.run(&mut session, Some(&chibi())).await;

        assert!(matches!(session.error(), Some(PipelineError::MissingCredential(_))));
        assert!(orchestrator.transport().sent().is_empty());
    }

    #[tokio::test]
    async fn single_stage_makes_one_combined_call() {
        let image = json!({
            "candidates": [{ "content": { "parts": [
                { "text": "here you go" },
                { "inlineData": { "mimeType": "image/png", "data": "QUJD" } }
            ] } }]
        });
        let orchestrator = orchestrator(StageCount::Single, vec![Ok(image)]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer: Arc<dyn SessionObserver> =
            Arc::new(move |s: &SessionSnapshot| sink.lock().unwrap().push(s.phase));
        let mut session = session_with_input().with_observer(observer);

        let report = report(orchestrator.run(&mut session, Some(&chibi())).await);

        assert_eq!(report.phase, PipelinePhase::Succeeded);
        assert_eq!(report.prompt, None);
        assert_eq!(session.result(), Some(&ImagePayload::new("QUJD", "image/png")));
        let sent = orchestrator.transport().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body["contents"][0]["parts"][0]["text"], "cute chibi collectible figure");
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                PipelinePhase::Analyzing,
                PipelinePhase::Generating,
                PipelinePhase::Succeeded
            ]
        );
    }

    #[tokio::test]
    async fn run_in_flight_is_ignored() {
        let orchestrator = orchestrator(StageCount::Two, vec![]);
        let mut session = session_with_input();
        session.begin_analyzing();

        let outcome = orchestrator.run(&mut session, Some(&chibi())).await;

        assert_eq!(outcome, RunOutcome::Ignored);
        assert_eq!(session.phase(), PipelinePhase::Analyzing);
        assert!(orchestrator.transport().sent().is_empty());
    }

    #[tokio::test]
    async fn failed_run_can_be_rerun() {
        let orchestrator = orchestrator(
            StageCount::Two,
            vec![
                Err(PipelineError::api_error(400, "bad")),
                Ok(text_response("prompt-X")),
                Ok(predict_response("AAAA")),
            ],
        );
        let mut session = session_with_input();

        orchestrator.run(&mut session, Some(&chibi())).await;
        assert_eq!(session.phase(), PipelinePhase::Failed);

        orchestrator.run(&mut session, Some(&chibi())).await;
        assert_eq!(session.phase(), PipelinePhase::Succeeded);
        assert!(session.error().is_none());
    }

    #[tokio::test]
    async fn analyze_returns_prompt_only() {
        let orchestrator = orchestrator(StageCount::Two, vec![Ok(text_response("prompt-X"))]);
        let image = InputImage::new(b"IMG".to_vec(), "image/png").unwrap();

        let prompt = orchestrator.analyze(&image, &chibi()).await.unwrap();

        assert_eq!(prompt, "prompt-X");
        assert_eq!(orchestrator.transport().sent().len(), 1);
    }

    #[tokio::test]
    async fn generate_is_stateless_convenience() {
        let orchestrator = orchestrator(
            StageCount::Two,
            vec![Ok(text_response("prompt-X")), Ok(predict_response("AAAA"))],
        );
        let image = InputImage::new(b"IMG".to_vec(), "image/png").unwrap();

        let payload = orchestrator.generate(&image, &chibi()).await.unwrap();
        assert_eq!(payload, ImagePayload::new("AAAA", "image/png"));

        let err = orchestrator.generate(&image, &chibi()).await.unwrap_err();
        assert_eq!(err.message(), "script exhausted");
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn retries_are_logged_with_stage() {
        let orchestrator = orchestrator(
            StageCount::Two,
            vec![
                Err(PipelineError::TimeoutError("slow".into())),
                Ok(text_response("prompt-X")),
                Ok(predict_response("AAAA")),
            ],
        );
        let mut session = session_with_input();

        orchestrator.run(&mut session, Some(&chibi())).await;

        assert!(logs_contain("transient failure, backing off"));
        assert!(logs_contain("stage=analysis"));
        assert!(logs_contain("run finished"));
    }
}
