use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::PdfBackend;
use crate::gemini::GeminiClient;
use crate::generator::ContentGenerator;
use crate::ocr::{OcrEngine, TesseractOcr};
use crate::service::{GenerativeTextService, SpeechService};
use crate::speech::SpeechSynthesizer;
use crate::tts::GoogleTranslateTts;
use crate::{
    AudioClip, Config, ExtractedText, FeedbackRequest, GeneratedContent, PipelineError,
    TextExtractor,
};

/// Pipeline state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Extracting,
    Generating,
    Synthesizing,
    Ready,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Extracting => "extracting",
            Stage::Generating => "generating",
            Stage::Synthesizing => "synthesizing",
            Stage::Ready => "ready",
            Stage::Error => "error",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the presentation layer shows for one revision.
///
/// Replaced as a whole; the audio always belongs to `content.explanation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub source_name: String,
    pub extracted: ExtractedText,
    pub content: GeneratedContent,
    pub audio: AudioClip,
    /// 0 for the initial generation, +1 per accepted feedback.
    pub revision: u32,
}

/// Events reported to an observer while the pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    StageChanged { from: Stage, to: Stage },
    /// Pages (0-based) whose text came from OCR.
    OcrFallback { pages: Vec<usize> },
    Failed {
        stage: Stage,
        kind: &'static str,
        message: String,
    },
}

/// The most recent failure of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Stage that was running when the error occurred.
    pub stage: Stage,
    pub kind: &'static str,
    pub message: String,
}

/// The shared, stateless collaborators a session is built from.
#[derive(Clone)]
pub struct Services {
    pub backend: Arc<dyn PdfBackend>,
    pub ocr: Arc<dyn OcrEngine>,
    pub text: Arc<dyn GenerativeTextService>,
    pub speech: Arc<dyn SpeechService>,
}

impl Services {
    /// Tesseract, Gemini and Google Translate TTS over one shared HTTP client.
    pub fn live(config: &Config, backend: Arc<dyn PdfBackend>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to build HTTP client; using defaults");
                reqwest::Client::new()
            });
        Self {
            backend,
            ocr: Arc::new(TesseractOcr::from_config(config)),
            text: Arc::new(GeminiClient::new(client.clone(), config)),
            speech: Arc::new(GoogleTranslateTts::new(client, config)),
        }
    }
}

type Observer = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Sequences extraction, generation and synthesis for one session and
/// handles feedback-driven regeneration.
///
/// Actions take `&mut self`, so a session runs one action at a time.
pub struct Orchestrator {
    extractor: Arc<TextExtractor>,
    generator: ContentGenerator,
    synthesizer: SpeechSynthesizer,
    stage: Stage,
    snapshot: Option<Arc<Snapshot>>,
    history: Vec<String>,
    last_error: Option<Failure>,
    observer: Option<Observer>,
}

impl Orchestrator {
    pub fn new(
        extractor: Arc<TextExtractor>,
        generator: ContentGenerator,
        synthesizer: SpeechSynthesizer,
    ) -> Self {
        Self {
            extractor,
            generator,
            synthesizer,
            stage: Stage::Idle,
            snapshot: None,
            history: Vec::new(),
            last_error: None,
            observer: None,
        }
    }

    pub fn from_services(services: &Services, config: &Config) -> Self {
        let extractor = TextExtractor::new(services.backend.clone(), services.ocr.clone())
            .with_dpi(config.ocr_dpi)
            .with_language(config.tesseract_language());
        Self::new(
            Arc::new(extractor),
            ContentGenerator::new(services.text.clone(), config),
            SpeechSynthesizer::new(services.speech.clone(), config),
        )
    }

    /// Report every [`PipelineEvent`] to `observer`.
    pub fn with_observer(
        mut self,
        observer: impl Fn(PipelineEvent) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The current consistent result, if any generation has completed.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.clone()
    }

    pub fn last_error(&self) -> Option<&Failure> {
        self.last_error.as_ref()
    }

    /// Feedback accepted since the current document was loaded, oldest first.
    pub fn feedback_history(&self) -> &[String] {
        &self.history
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }

    fn transition(&mut self, to: Stage) {
        let from = self.stage;
        if from == to {
            return;
        }
        tracing::debug!(%from, %to, "stage change");
        self.stage = to;
        self.emit(PipelineEvent::StageChanged { from, to });
    }

    /// Record `err`, pass through [`Stage::Error`] and settle back on the
    /// last stable state.
    fn fail(&mut self, err: PipelineError) -> PipelineError {
        let failure = Failure {
            stage: self.stage,
            kind: err.kind(),
            message: err.to_string(),
        };
        tracing::error!(
            stage = %failure.stage,
            kind = failure.kind,
            error = %failure.message,
            "pipeline failed"
        );
        self.emit(PipelineEvent::Failed {
            stage: failure.stage,
            kind: failure.kind,
            message: failure.message.clone(),
        });
        self.last_error = Some(failure);

        self.transition(Stage::Error);
        let settled = if self.snapshot.is_some() {
            Stage::Ready
        } else {
            Stage::Idle
        };
        self.transition(settled);
        err
    }

    fn commit(&mut self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.snapshot = Some(Arc::clone(&snapshot));
        self.last_error = None;
        self.transition(Stage::Ready);
        tracing::info!(
            source = %snapshot.source_name,
            revision = snapshot.revision,
            "snapshot ready"
        );
        snapshot
    }

    /// Run the whole pipeline on a newly uploaded PDF.
    ///
    /// On success the previous document's snapshot and feedback history are
    /// replaced. On failure they are left untouched.
    pub async fn process(
        &mut self,
        source_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Arc<Snapshot>, PipelineError> {
        let source_name = source_name.into();
        tracing::info!(source = %source_name, bytes = bytes.len(), "processing document");

        match self.run_initial(bytes).await {
            Ok((extracted, content, audio)) => {
                self.history.clear();
                Ok(self.commit(Snapshot {
                    source_name,
                    extracted,
                    content,
                    audio,
                    revision: 0,
                }))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn run_initial(
        &mut self,
        bytes: Vec<u8>,
    ) -> Result<(ExtractedText, GeneratedContent, AudioClip), PipelineError> {
        self.transition(Stage::Extracting);
        let extractor = Arc::clone(&self.extractor);
        let extracted = tokio::task::spawn_blocking(move || extractor.extract(&bytes))
            .await
            .map_err(|e| PipelineError::DocumentParse(format!("extraction task failed: {}", e)))??;
        if !extracted.ocr_pages().is_empty() {
            self.emit(PipelineEvent::OcrFallback {
                pages: extracted.ocr_pages().to_vec(),
            });
        }

        self.transition(Stage::Generating);
        let content = self.generator.generate_initial(&extracted).await?;

        self.transition(Stage::Synthesizing);
        let audio = self.synthesizer.synthesize(&content.explanation).await?;

        Ok((extracted, content, audio))
    }

    /// Regenerate the explanation from `feedback` and re-synthesize it.
    ///
    /// Requires a ready snapshot. The new explanation and its audio replace
    /// the snapshot together; on failure the previous snapshot stays.
    pub async fn submit_feedback(
        &mut self,
        feedback: &str,
    ) -> Result<Arc<Snapshot>, PipelineError> {
        let Some(current) = self.snapshot.clone() else {
            return Err(PipelineError::InvalidState(
                "no explanation to revise yet; upload a document first".to_string(),
            ));
        };
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return Err(PipelineError::InvalidInput(
                "feedback must not be empty".to_string(),
            ));
        }

        tracing::info!(revision = current.revision, "applying feedback");
        let request =
            FeedbackRequest::new(&current.content, feedback).with_history(self.history.clone());

        match self.run_feedback(&request).await {
            Ok((content, audio)) => {
                self.history.push(feedback.to_string());
                Ok(self.commit(Snapshot {
                    source_name: current.source_name.clone(),
                    extracted: current.extracted.clone(),
                    content,
                    audio,
                    revision: current.revision + 1,
                }))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn run_feedback(
        &mut self,
        request: &FeedbackRequest,
    ) -> Result<(GeneratedContent, AudioClip), PipelineError> {
        self.transition(Stage::Generating);
        let content = self.generator.regenerate(request).await?;

        self.transition(Stage::Synthesizing);
        let audio = self.synthesizer.synthesize(&content.explanation).await?;

        Ok((content, audio))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::mock::{
        FakeOcrEngine, FakePage, FakePdfBackend, RecordingSpeechService, ScriptedResponse,
        ScriptedTextService,
    };

    fn services(pages: Vec<FakePage>, text: ScriptedTextService) -> Services {
        Services {
            backend: Arc::new(FakePdfBackend::new(pages)),
            ocr: Arc::new(FakeOcrEngine::new()),
            text: Arc::new(text),
            speech: Arc::new(RecordingSpeechService::new()),
        }
    }

    fn recorder() -> (
        Arc<Mutex<Vec<PipelineEvent>>>,
        impl Fn(PipelineEvent) + Send + Sync + 'static,
    ) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        (events, move |e: PipelineEvent| sink.lock().unwrap().push(e))
    }

    fn stages(events: &[PipelineEvent]) -> Vec<Stage> {
        events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::StageChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn starts_idle_without_snapshot() {
        let s = services(vec![], ScriptedTextService::new("x"));
        let orch = Orchestrator::from_services(&s, &Config::default());
        assert_eq!(orch.stage(), Stage::Idle);
        assert!(orch.snapshot().is_none());
        assert!(orch.last_error().is_none());
    }

    #[tokio::test]
    async fn runs_stages_in_order() {
        let s = services(
            vec![FakePage::text("Page one")],
            ScriptedTextService::new("SUMMARY:\nS\nEXPLANATION:\nE"),
        );
        let (events, sink) = recorder();
        let mut orch = Orchestrator::from_services(&s, &Config::default()).with_observer(sink);
        let snapshot = orch.process("doc.pdf", b"%PDF-1.7".to_vec()).await.unwrap();

        assert_eq!(orch.stage(), Stage::Ready);
        assert_eq!(snapshot.revision, 0);
        assert_eq!(snapshot.source_name, "doc.pdf");
        assert_eq!(
            stages(&events.lock().unwrap()),
            vec![
                Stage::Extracting,
                Stage::Generating,
                Stage::Synthesizing,
                Stage::Ready
            ]
        );
    }

    #[tokio::test]
    async fn reports_ocr_pages() {
        let s = services(
            vec![FakePage::text("typed"), FakePage::scanned("scanned")],
            ScriptedTextService::new("SUMMARY:\nS\nEXPLANATION:\nE"),
        );
        let (events, sink) = recorder();
        let mut orch = Orchestrator::from_services(&s, &Config::default()).with_observer(sink);
        orch.process("doc.pdf", b"%PDF-1.7".to_vec()).await.unwrap();
        assert!(
            events
                .lock()
                .unwrap()
                .contains(&PipelineEvent::OcrFallback { pages: vec![1] })
        );
    }

    #[tokio::test]
    async fn parse_failure_settles_back_to_idle() {
        let s = services(vec![], ScriptedTextService::new("unused"));
        let (events, sink) = recorder();
        let mut orch = Orchestrator::from_services(&s, &Config::default()).with_observer(sink);
        let err = orch.process("bad.pdf", b"not a pdf".to_vec()).await.unwrap_err();

        assert!(matches!(err, PipelineError::DocumentParse(_)));
        assert_eq!(orch.stage(), Stage::Idle);
        let failure = orch.last_error().unwrap();
        assert_eq!(failure.stage, Stage::Extracting);
        assert_eq!(failure.kind, "document_parse");
        assert_eq!(
            stages(&events.lock().unwrap()),
            vec![Stage::Extracting, Stage::Error, Stage::Idle]
        );
    }

    #[tokio::test]
    async fn feedback_before_upload_is_invalid_state() {
        let s = services(vec![], ScriptedTextService::new("unused"));
        let mut orch = Orchestrator::from_services(&s, &Config::default());
        let err = orch.submit_feedback("simpler").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidState(_)));
        assert_eq!(orch.stage(), Stage::Idle);
    }

    #[tokio::test]
    async fn blank_feedback_is_rejected_without_call() {
        let text = Arc::new(ScriptedTextService::new("SUMMARY:\nS\nEXPLANATION:\nE"));
        let s = Services {
            text: text.clone(),
            ..services(vec![FakePage::text("p")], ScriptedTextService::new("x"))
        };
        let mut orch = Orchestrator::from_services(&s, &Config::default());
        orch.process("doc.pdf", b"%PDF-".to_vec()).await.unwrap();
        let err = orch.submit_feedback("  ").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert_eq!(text.call_count(), 1);
        assert_eq!(orch.stage(), Stage::Ready);
    }

    #[tokio::test]
    async fn feedback_failure_keeps_previous_snapshot() {
        let text = ScriptedTextService::with_sequence(vec![
            ScriptedResponse::Text("SUMMARY:\nS\nEXPLANATION:\nE1".into()),
            ScriptedResponse::RateLimited,
        ]);
        let s = services(vec![FakePage::text("p")], text);
        let mut orch = Orchestrator::from_services(&s, &Config::default());
        let first = orch.process("doc.pdf", b"%PDF-".to_vec()).await.unwrap();

        let err = orch.submit_feedback("simpler please").await.unwrap_err();
        assert!(matches!(err, PipelineError::Generation(_)));
        assert_eq!(orch.stage(), Stage::Ready);
        assert_eq!(orch.snapshot().unwrap(), first);
        assert!(orch.feedback_history().is_empty());
        assert_eq!(orch.last_error().unwrap().stage, Stage::Generating);
    }

    #[tokio::test]
    async fn new_upload_resets_lineage() {
        let s = services(
            vec![FakePage::text("p")],
            ScriptedTextService::new("SUMMARY:\nS\nEXPLANATION:\nE"),
        );
        let mut orch = Orchestrator::from_services(&s, &Config::default());
        orch.process("a.pdf", b"%PDF-".to_vec()).await.unwrap();
        let revised = orch.submit_feedback("more examples").await.unwrap();
        assert_eq!(revised.revision, 1);
        assert_eq!(orch.feedback_history(), ["more examples".to_string()]);

        let fresh = orch.process("b.pdf", b"%PDF-".to_vec()).await.unwrap();
        assert_eq!(fresh.revision, 0);
        assert_eq!(fresh.source_name, "b.pdf");
        assert!(orch.feedback_history().is_empty());
    }
}
