use std::sync::Arc;

use crate::prompt::{self, PromptOptions};
use crate::service::{GenerativeTextService, TextRequest};
use crate::{
    Config, ExtractedText, FeedbackRequest, GeneratedContent, Language, PipelineError,
    SummaryPolicy,
};

/// Produces summaries and explanations through a [`GenerativeTextService`].
///
/// Every call is a fresh request; nothing is cached.
pub struct ContentGenerator {
    service: Arc<dyn GenerativeTextService>,
    language: Language,
    keywords: Vec<String>,
    summary_policy: SummaryPolicy,
}

impl ContentGenerator {
    pub fn new(service: Arc<dyn GenerativeTextService>, config: &Config) -> Self {
        Self {
            service,
            language: config.language,
            keywords: config.keywords.clone(),
            summary_policy: config.summary_policy,
        }
    }

    fn options(&self) -> PromptOptions<'_> {
        PromptOptions {
            language: self.language,
            keywords: &self.keywords,
        }
    }

    async fn call(&self, prompt: String) -> Result<String, PipelineError> {
        let request = TextRequest {
            system_instruction: Some(prompt::SYSTEM_INSTRUCTION.to_string()),
            prompt,
        };
        self.service.generate(&request).await.map_err(|e| {
            tracing::error!(service = self.service.name(), error = %e, "generation request failed");
            PipelineError::from_generation(e)
        })
    }

    /// Summarize and explain `text` in one request.
    pub async fn generate_initial(
        &self,
        text: &ExtractedText,
    ) -> Result<GeneratedContent, PipelineError> {
        if text.is_blank() {
            return Err(PipelineError::EmptyDocument);
        }
        tracing::info!(
            language = self.language.name,
            chars = text.as_str().len(),
            "generating summary and explanation"
        );

        let response = self
            .call(prompt::initial_prompt(text.as_str(), &self.options()))
            .await?;
        Ok(prompt::parse_sections(&response))
    }

    /// Revise the explanation according to the user's feedback.
    ///
    /// Whether the summary is revised too depends on the [`SummaryPolicy`];
    /// otherwise `prior_summary` is carried over unchanged.
    pub async fn regenerate(
        &self,
        request: &FeedbackRequest,
    ) -> Result<GeneratedContent, PipelineError> {
        let feedback = request.feedback_text.trim();
        if feedback.is_empty() {
            return Err(PipelineError::InvalidInput(
                "feedback must not be empty".to_string(),
            ));
        }

        let revise_summary = match self.summary_policy {
            SummaryPolicy::Keep => false,
            SummaryPolicy::Regenerate => true,
            SummaryPolicy::FollowFeedback => prompt::feedback_mentions_summary(feedback),
        };
        tracing::info!(revise_summary, history = request.history.len(), "regenerating explanation");

        let response = self
            .call(prompt::revision_prompt(
                &request.prior_summary,
                &request.prior_explanation,
                feedback,
                &request.history,
                revise_summary,
                &self.options(),
            ))
            .await?;

        if revise_summary {
            let mut content = prompt::parse_sections(&response);
            if content.summary.is_empty() {
                content.summary = request.prior_summary.clone();
            }
            Ok(content)
        } else {
            Ok(GeneratedContent {
                summary: request.prior_summary.clone(),
                explanation: prompt::parse_explanation_only(&response),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ScriptedResponse, ScriptedTextService};

    fn generator(service: Arc<ScriptedTextService>, policy: SummaryPolicy) -> ContentGenerator {
        let config = Config {
            summary_policy: policy,
            ..Config::default()
        };
        ContentGenerator::new(service, &config)
    }

    fn text(s: &str) -> ExtractedText {
        ExtractedText::new(s.to_string(), 1, vec![])
    }

    #[tokio::test]
    async fn initial_well_formed_response() {
        let service = Arc::new(ScriptedTextService::new(
            "SUMMARY:\nA short summary.\nEXPLANATION:\nA long explanation with an example.",
        ));
        let g = generator(service.clone(), SummaryPolicy::default());
        let content = g.generate_initial(&text("Some document")).await.unwrap();
        assert_eq!(content.summary, "A short summary.");
        assert_eq!(content.explanation, "A long explanation with an example.");

        let requests = service.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.contains("Some document"));
        assert_eq!(
            requests[0].system_instruction.as_deref(),
            Some(prompt::SYSTEM_INSTRUCTION)
        );
    }

    #[tokio::test]
    async fn initial_malformed_response_degrades() {
        let raw = "The model ignored the format entirely.";
        let service = Arc::new(ScriptedTextService::new(raw));
        let g = generator(service, SummaryPolicy::default());
        let content = g.generate_initial(&text("doc")).await.unwrap();
        assert_eq!(content.summary, "");
        assert_eq!(content.explanation, raw);
    }

    #[tokio::test]
    async fn blank_text_is_rejected_without_call() {
        let service = Arc::new(ScriptedTextService::new("unused"));
        let g = generator(service.clone(), SummaryPolicy::default());
        let err = g.generate_initial(&text("  \n")).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDocument));
        assert_eq!(service.call_count(), 0);
    }

    #[tokio::test]
    async fn service_failures_map_to_taxonomy() {
        let service = Arc::new(ScriptedTextService::with_sequence(vec![
            ScriptedResponse::RateLimited,
            ScriptedResponse::MissingCredential,
        ]));
        let g = generator(service, SummaryPolicy::default());
        let err = g.generate_initial(&text("doc")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Generation(_)));
        let err = g.generate_initial(&text("doc")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn regenerate_includes_prior_and_feedback_and_keeps_summary() {
        let service = Arc::new(ScriptedTextService::new("A much simpler take."));
        let g = generator(service.clone(), SummaryPolicy::default());
        let request = FeedbackRequest {
            prior_summary: "S".into(),
            prior_explanation: "X".into(),
            feedback_text: "make it simpler".into(),
            history: vec![],
        };
        let content = g.regenerate(&request).await.unwrap();
        assert_eq!(content.summary, "S");
        assert_eq!(content.explanation, "A much simpler take.");
        assert_ne!(content.explanation, "X");

        let prompt = &service.requests()[0].prompt;
        assert!(prompt.contains("X"));
        assert!(prompt.contains("make it simpler"));
    }

    #[tokio::test]
    async fn regenerate_follows_summary_feedback() {
        let service = Arc::new(ScriptedTextService::new(
            "SUMMARY:\nNew summary.\nEXPLANATION:\nNew explanation.",
        ));
        let g = generator(service, SummaryPolicy::FollowFeedback);
        let request = FeedbackRequest {
            prior_summary: "Old summary.".into(),
            prior_explanation: "Old explanation.".into(),
            feedback_text: "the summary is too vague".into(),
            history: vec![],
        };
        let content = g.regenerate(&request).await.unwrap();
        assert_eq!(content.summary, "New summary.");
        assert_eq!(content.explanation, "New explanation.");
    }

    #[tokio::test]
    async fn keep_policy_never_revises_summary() {
        let service = Arc::new(ScriptedTextService::new("Revised."));
        let g = generator(service.clone(), SummaryPolicy::Keep);
        let request = FeedbackRequest {
            prior_summary: "Old summary.".into(),
            prior_explanation: "Old.".into(),
            feedback_text: "rewrite the summary".into(),
            history: vec!["earlier note".into()],
        };
        let content = g.regenerate(&request).await.unwrap();
        assert_eq!(content.summary, "Old summary.");
        assert_eq!(content.explanation, "Revised.");
        assert!(service.requests()[0].prompt.contains("- earlier note"));
    }

    #[tokio::test]
    async fn regenerate_policy_keeps_prior_summary_when_unparseable() {
        let service = Arc::new(ScriptedTextService::new("No labels here."));
        let g = generator(service, SummaryPolicy::Regenerate);
        let request = FeedbackRequest {
            prior_summary: "Old summary.".into(),
            prior_explanation: "Old.".into(),
            feedback_text: "add an example".into(),
            history: vec![],
        };
        let content = g.regenerate(&request).await.unwrap();
        assert_eq!(content.summary, "Old summary.");
        assert_eq!(content.explanation, "No labels here.");
    }

    #[tokio::test]
    async fn blank_feedback_is_rejected() {
        let service = Arc::new(ScriptedTextService::new("unused"));
        let g = generator(service.clone(), SummaryPolicy::default());
        let request = FeedbackRequest::new(&GeneratedContent::default(), "   ");
        let err = g.regenerate(&request).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert_eq!(service.call_count(), 0);
    }
}
