//! HTTP client for the remote evaluation endpoints
//!
//! The remote service owns every prompt: it summarizes transcript chunks,
//! synthesizes the final narrative, renders the PDF and answers workbench
//! questions. This module only speaks its JSON protocol.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ReportConfig;
use crate::error::{Error, Result};
use crate::types::Conversation;

use super::payload::{
    AnalyzeRequest, AnalyzeResponse, BatchAnalyzeRequest, BatchAnalyzeResponse, ChatMessage,
    FinalReportRequest, FinalReportResponse, PdfPayload, ReportStats,
};
use super::state::Stage;

const RETRY_INITIAL_DELAY: Duration = Duration::from_millis(500);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Longest one backend call can take: every attempt timing out, plus the
/// backoff between attempts.
pub fn call_budget(config: &ReportConfig) -> Duration {
    let attempts = config.max_retries as u32 + 1;
    let mut backoff = Duration::ZERO;
    let mut delay = RETRY_INITIAL_DELAY;
    for _ in 0..config.max_retries {
        backoff += delay;
        delay = std::cmp::min(delay * 2, RETRY_MAX_DELAY);
    }
    config.request_timeout() * attempts + backoff
}

/// Remote operations the report pipeline and the analysis chat depend on.
#[async_trait]
pub trait ReportBackend: Send + Sync {
    /// Summarize one chunk of conversations.
    async fn batch_analyze(&self, conversations: &[&Conversation]) -> Result<String>;

    /// Synthesize chunk summaries plus aggregate stats into report HTML.
    async fn final_report(&self, batch_summaries: &[String], stats: &ReportStats) -> Result<String>;

    /// Render the final document.
    async fn render_pdf(&self, payload: &PdfPayload) -> Result<Vec<u8>>;

    /// Answer a question about pinned workbench items.
    async fn analyze(
        &self,
        messages: &[ChatMessage],
        context_items: &[serde_json::Value],
    ) -> Result<String>;
}

/// [`ReportBackend`] over HTTP
pub struct HttpReportBackend {
    http_client: reqwest::Client,
    base_url: String,
    max_retries: usize,
    timeout_secs: u64,
}

impl HttpReportBackend {
    /// Create a new backend from configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &ReportConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(api_key) = &config.api_key {
            let auth_value = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            timeout_secs: config.request_timeout_secs,
        })
    }

    /// Absolute URL of a stage's endpoint.
    pub fn endpoint_url(&self, stage: Stage) -> String {
        format!("{}/{}", self.base_url, stage.endpoint())
    }

    async fn send<B: Serialize + ?Sized>(&self, stage: Stage, body: &B) -> Result<reqwest::Response> {
        let response = self
            .http_client
            .post(self.endpoint_url(stage))
            .json(body)
            .send()
            .await
            .map_err(|e| self.request_error(stage, e))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Remote {
                stage,
                message: format!("API error ({}): {}", status, error_text),
            })
        }
    }

    async fn post_json<B, R>(&self, stage: Stage, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let response = self.send(stage, body).await?;
        response.json().await.map_err(|e| Error::Remote {
            stage,
            message: format!("failed to parse response: {}", e),
        })
    }

    async fn post_bytes<B>(&self, stage: Stage, body: &B) -> Result<Vec<u8>>
    where
        B: Serialize + ?Sized + Sync,
    {
        let response = self.send(stage, body).await?;
        let bytes = response.bytes().await.map_err(|e| self.request_error(stage, e))?;
        Ok(bytes.to_vec())
    }

    fn request_error(&self, stage: Stage, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                stage,
                secs: self.timeout_secs,
            }
        } else {
            Error::Remote {
                stage,
                message: format!("HTTP request failed: {}", e),
            }
        }
    }

    /// Run `op`, retrying transient failures with exponential backoff.
    async fn with_retry<T, F, Fut>(&self, stage: Stage, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;
        let mut delay = RETRY_INITIAL_DELAY;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    stage = %stage,
                    "Retrying request (attempt {}/{}), waiting {:?}",
                    attempt + 1,
                    self.max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, RETRY_MAX_DELAY);
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    tracing::warn!(stage = %stage, "Transient error: {}", e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Remote {
            stage,
            message: "max retries exceeded".to_string(),
        }))
    }
}

#[async_trait]
impl ReportBackend for HttpReportBackend {
    async fn batch_analyze(&self, conversations: &[&Conversation]) -> Result<String> {
        let body = BatchAnalyzeRequest { conversations };
        let response: BatchAnalyzeResponse = self
            .with_retry(Stage::Map, || self.post_json(Stage::Map, &body))
            .await?;
        Ok(response.analysis)
    }

    async fn final_report(&self, batch_summaries: &[String], stats: &ReportStats) -> Result<String> {
        let body = FinalReportRequest {
            batch_summaries,
            stats,
        };
        let response: FinalReportResponse = self
            .with_retry(Stage::Synthesize, || self.post_json(Stage::Synthesize, &body))
            .await?;
        Ok(response.html)
    }

    async fn render_pdf(&self, payload: &PdfPayload) -> Result<Vec<u8>> {
        self.with_retry(Stage::Render, || self.post_bytes(Stage::Render, payload))
            .await
    }

    async fn analyze(
        &self,
        messages: &[ChatMessage],
        context_items: &[serde_json::Value],
    ) -> Result<String> {
        let body = AnalyzeRequest {
            messages,
            context_items,
        };
        let response: AnalyzeResponse = self
            .with_retry(Stage::Analyze, || self.post_json(Stage::Analyze, &body))
            .await?;
        Ok(response.response)
    }
}
