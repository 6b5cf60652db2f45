use std::sync::Arc;

use crate::service::SpeechService;
use crate::text_processing::strip_markdown;
use crate::{AudioClip, Config, Language, PipelineError};

/// Converts explanation text into an [`AudioClip`].
pub struct SpeechSynthesizer {
    service: Arc<dyn SpeechService>,
    language: Language,
}

impl SpeechSynthesizer {
    pub fn new(service: Arc<dyn SpeechService>, config: &Config) -> Self {
        Self {
            service,
            language: config.language,
        }
    }

    /// Synthesize `text`. Text with nothing speakable yields an empty clip
    /// without contacting the service.
    pub async fn synthesize(&self, text: &str) -> Result<AudioClip, PipelineError> {
        let speakable = strip_markdown(text);
        if speakable.trim().is_empty() {
            return Ok(AudioClip::empty());
        }

        tracing::info!(
            service = self.service.name(),
            lang = self.language.code,
            chars = speakable.len(),
            "synthesizing speech"
        );
        let bytes = self
            .service
            .synthesize(speakable.trim(), self.language.code)
            .await
            .map_err(|e| {
                tracing::error!(
                    service = self.service.name(),
                    error = %e,
                    "speech synthesis failed"
                );
                PipelineError::from_synthesis(e)
            })?;
        Ok(AudioClip::mp3(bytes))
    }
}
