pub mod fallback;
pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::llm::{GenerateRequest, LlmClient};
use crate::models::{ComparisonKind, ComparisonRecord};
use crate::telemetry::metrics::SUMMARY_FALLBACK_COUNT;

pub use fallback::fallback_summary;
pub use prompt::fit_to_length;

#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub client: String,
    pub kind: ComparisonKind,
    pub records: Vec<ComparisonRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryOrigin {
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub kind: ComparisonKind,
    pub text: String,
    pub origin: SummaryOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, request: &SummaryRequest, max_chars: usize) -> AppResult<String>;
}

/// Narrates comparisons through the chat completion API.
pub struct LlmSummarizer {
    pub client: LlmClient,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub min_chars: usize,
}

#[async_trait::async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, request: &SummaryRequest, max_chars: usize) -> AppResult<String> {
        let req = GenerateRequest {
            model: self.model.clone(),
            system: prompt::system_prompt(self.min_chars, max_chars),
            prompt: prompt::user_prompt(request, self.min_chars, max_chars),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            purpose: format!("summary {}", request.kind.as_str()),
        };

        let resp = self.client.generate(&req).await.map_err(|e| {
            match crate::llm::client::classify_error(&e) {
                "rate_limit" => AppError::RateLimited(e.to_string()),
                _ => AppError::Summarization(e.to_string()),
            }
        })?;

        let text = fit_to_length(&resp.content, max_chars);
        if text.is_empty() {
            return Err(AppError::Summarization(
                "model returned an empty summary".to_string(),
            ));
        }
        Ok(text)
    }
}

/// Stand-in used when no API key is configured.
pub struct UnavailableSummarizer;

#[async_trait::async_trait]
impl Summarizer for UnavailableSummarizer {
    async fn summarize(&self, _: &SummaryRequest, _: usize) -> AppResult<String> {
        Err(AppError::Summarization(
            "no language model API key configured".to_string(),
        ))
    }
}

/// Produces a summary for every request. Summarizer errors and timeouts turn
/// into the templated fallback.
pub struct SummaryGenerator {
    summarizer: Arc<dyn Summarizer>,
    max_chars: usize,
    timeout: Duration,
}

impl SummaryGenerator {
    pub fn new(summarizer: Arc<dyn Summarizer>, max_chars: usize, timeout: Duration) -> Self {
        Self {
            summarizer,
            max_chars,
            timeout,
        }
    }

    #[tracing::instrument(
        name = "summary generate",
        skip(self, request),
        fields(
            client = %request.client,
            summary.kind = request.kind.as_str(),
            summary.origin,
            summary.chars,
        )
    )]
    pub async fn generate(&self, request: &SummaryRequest) -> Summary {
        let attempt =
            tokio::time::timeout(self.timeout, self.summarizer.summarize(request, self.max_chars))
                .await
                .unwrap_or_else(|_| Err(AppError::SummarizationTimeout(self.timeout)))
                .and_then(|text| {
                    let text = fit_to_length(&text, self.max_chars);
                    if text.is_empty() {
                        Err(AppError::Summarization("empty summary".to_string()))
                    } else {
                        Ok(text)
                    }
                });

        let summary = match attempt {
            Ok(text) => Summary {
                kind: request.kind,
                text,
                origin: SummaryOrigin::Model,
                fallback_reason: None,
            },
            Err(err) => {
                tracing::warn!(
                    client = %request.client,
                    kind = request.kind.as_str(),
                    error.type = err.kind(),
                    error = %err,
                    "Summarizer unavailable, using fallback summary"
                );
                SUMMARY_FALLBACK_COUNT.add(1, &[KeyValue::new("error.type", err.kind())]);
                Summary {
                    kind: request.kind,
                    text: fallback_summary(request, self.max_chars),
                    origin: SummaryOrigin::Fallback,
                    fallback_reason: Some(err.to_string()),
                }
            }
        };

        let span = tracing::Span::current();
        span.record(
            "summary.origin",
            match summary.origin {
                SummaryOrigin::Model => "model",
                SummaryOrigin::Fallback => "fallback",
            },
        );
        span.record("summary.chars", summary.text.chars().count());
        summary
    }
}
