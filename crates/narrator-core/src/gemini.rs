//! Google Gemini `generateContent` client.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::service::{GenerativeTextService, ServiceError, TextRequest};
use crate::Config;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> Result<String, ServiceError> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(ServiceError::EmptyResponse(match block_reason {
                Some(reason) => format!("prompt blocked ({})", reason),
                None => "no candidates returned".to_string(),
            }));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ServiceError::EmptyResponse(format!(
                "candidate has no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }
}

/// [`GenerativeTextService`] backed by the Gemini REST API.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    temperature: f32,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            api_key: config
                .gemini_api_key
                .clone()
                .filter(|k| !k.trim().is_empty()),
            model: config.gemini_model.clone(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    fn endpoint(&self) -> String {
        let model = self.model.trim_start_matches("models/");
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

impl GenerativeTextService for GeminiClient {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn generate<'a>(
        &'a self,
        request: &'a TextRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, ServiceError>> + Send + 'a>> {
        Box::pin(async move {
            let api_key = self.api_key.as_deref().ok_or_else(|| {
                ServiceError::MissingCredential(
                    "Gemini API key not found; set GEMINI_API_KEY in the environment or .env file"
                        .to_string(),
                )
            })?;

            let body = GenerateRequest {
                system_instruction: request.system_instruction.as_deref().map(|text| Content {
                    role: None,
                    parts: vec![Part { text }],
                }),
                contents: vec![Content {
                    role: Some("user"),
                    parts: vec![Part {
                        text: &request.prompt,
                    }],
                }],
                generation_config: GenerationConfig {
                    temperature: self.temperature,
                },
            };

            tracing::debug!(
                model = %self.model,
                prompt_chars = request.prompt.len(),
                "calling Gemini"
            );

            let resp = self
                .client
                .post(self.endpoint())
                .header("x-goog-api-key", api_key)
                .timeout(self.timeout)
                .json(&body)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(ServiceError::from_status(status.as_u16(), body));
            }

            let data: GenerateResponse = resp.json().await?;
            data.into_text()
        })
    }
}
