//! Gemini `generateContent` client used to summarize the report.
//!
//! Only transport failures are errors. A non-200 status or an unexpected
//! body is folded into the returned text so the channel still gets a reply.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::GeminiConfig;

/// Returned when a 200 reply has no usable text.
pub const FALLBACK_REPLY: &str = "⚠️ Não consegui entender a resposta da IA.";

/// Text returned in place of a summary when the API answers with `status`.
pub fn api_error_reply(status: u16) -> String {
    format!("❌ Erro na API: {status}")
}

#[derive(Debug, Error)]
pub enum SummarizerError {
    /// Timeout, DNS failure, refused connection, or a body that could not
    /// be read.
    #[error("Summarizer request failed: {0}")]
    Transport(String),
}

/// Turns a prompt into summary text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, prompt: &str) -> Result<String, SummarizerError>;
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Pull `candidates[0].content.parts[0].text` out of a response body.
fn extract_text(body: &str) -> Option<String> {
    let response: GenerateContentResponse = serde_json::from_str(body).ok()?;
    response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .next()?
        .text
        .filter(|text| !text.is_empty())
}

pub struct GeminiSummarizer {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl GeminiSummarizer {
    pub fn new(config: &GeminiConfig, timeout: Duration) -> Result<Self, SummarizerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SummarizerError::Transport(e.to_string()))?;
        Ok(Self {
            api_key: config.api_key.clone(),
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                config.api_base.trim_end_matches('/'),
                config.model
            ),
            client,
        })
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, prompt: &str) -> Result<String, SummarizerError> {
        let start = std::time::Instant::now();
        let request = GenerateContentRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
        };

        // without_url(): the query string carries the API key.
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| SummarizerError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SummarizerError::Transport(e.without_url().to_string()))?;

        if status != StatusCode::OK {
            warn!(status = status.as_u16(), body = %body, "Gemini API returned an error");
            return Ok(api_error_reply(status.as_u16()));
        }

        match extract_text(&body) {
            Some(text) => {
                info!(
                    chars = text.chars().count(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Summary received"
                );
                Ok(text)
            }
            None => {
                warn!(body = %body, "Gemini response had no candidate text");
                Ok(FALLBACK_REPLY.to_string())
            }
        }
    }
}
