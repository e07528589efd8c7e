//! Batched report pipeline
//!
//! ```text
//! conversations ──chunk──► batch-analyze × N ──► final-report ──► pdf ──► bytes
//!                          (map, best effort)     (reduce)       (render)
//! ```
//!
//! The map stage tolerates partial failure: a failed or timed-out chunk is
//! logged and excluded, and the run only fails when no chunk succeeded. Reduce
//! and render failures are terminal. Every backend call is bounded by
//! [`call_budget`], which leaves room for the client's own retries. The
//! published error state carries a short fixed message; details go to the log. Progress and stage changes are published
//! on a `watch` channel; terminal states revert to idle after the configured
//! delay.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{AgentRegistry, ReportConfig};
use crate::error::{Error, Result};
use crate::filter::DateRange;
use crate::format::format_date_range;
use crate::types::Conversation;

use super::client::{call_budget, ReportBackend};
use super::payload::{PdfPayload, ReportStats};
use super::state::{PipelineState, Stage};

/// Input for one report run.
pub struct ReportInput<'a> {
    /// Conversations to report on, in the order they are chunked
    pub conversations: Vec<&'a Conversation>,
    /// Range shown on the document ("All Time" when `None`)
    pub date_range: Option<DateRange>,
    pub registry: &'a AgentRegistry,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct ReportOutput {
    pub run_id: Uuid,
    /// Rendered document bytes
    pub document: Vec<u8>,
    /// Report HTML returned by the reduce stage
    pub html: String,
    pub chunks_total: usize,
    pub chunks_failed: usize,
}

/// Percentage of attempted chunks, rounded.
pub fn progress_percent(attempted: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((attempted * 100) as f64 / total as f64).round() as u8
}

/// Drives report runs against a [`ReportBackend`], one at a time.
pub struct ReportPipeline {
    backend: Arc<dyn ReportBackend>,
    config: ReportConfig,
    state: Arc<watch::Sender<PipelineState>>,
}

impl ReportPipeline {
    pub fn new(backend: Arc<dyn ReportBackend>, config: ReportConfig) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            backend,
            config,
            state: Arc::new(state),
        }
    }

    /// Receive every state change.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> PipelineState {
        self.state.borrow().clone()
    }

    /// Apply a transition atomically, publishing it when it changes the state.
    fn transition<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&PipelineState) -> Result<PipelineState>,
    {
        let mut outcome = Ok(());
        self.state.send_if_modified(|state| match f(state) {
            Ok(next) => {
                let changed = *state != next;
                *state = next;
                changed
            }
            Err(e) => {
                outcome = Err(e);
                false
            }
        });
        outcome
    }

    /// Run the whole pipeline.
    ///
    /// Returns [`Error::PipelineBusy`] without touching the state when a run is
    /// already in flight. Any other error leaves the pipeline in the `error`
    /// state, which reverts to idle after the reset delay.
    pub async fn run(&self, input: ReportInput<'_>) -> Result<ReportOutput> {
        if self.transition(PipelineState::start).is_err() {
            return Err(Error::PipelineBusy);
        }

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("report_run", run_id = %run_id);

        let result = self.execute(run_id, input).instrument(span).await;

        if let Err(e) = &result {
            let stage = failed_stage(e);
            tracing::error!(run_id = %run_id, stage = %stage, error = %e, "Report run failed");
            if let Err(te) = self.transition(|s| s.fail(stage, state_message(e))) {
                tracing::warn!(error = %te, "Could not record pipeline failure");
            }
        }
        self.schedule_reset();

        result
    }

    async fn execute(&self, run_id: Uuid, input: ReportInput<'_>) -> Result<ReportOutput> {
        let ReportInput {
            conversations,
            date_range,
            registry,
        } = input;

        tracing::info!(
            conversations = conversations.len(),
            chunk_size = self.config.chunk_size,
            workers = self.config.max_concurrent_chunks,
            "Report run started"
        );

        // Map
        let (summaries, chunks_total) = self.map_chunks(&conversations).await?;
        let chunks_failed = chunks_total - summaries.len();

        // Reduce
        self.transition(PipelineState::synthesize)?;
        let stats = ReportStats::compute(&conversations, registry);
        let html = self
            .bounded(Stage::Synthesize, self.backend.final_report(&summaries, &stats))
            .await?;

        // Render
        self.transition(PipelineState::render)?;
        let label = format_date_range(date_range.map(|r| r.start), date_range.map(|r| r.end));
        let payload = PdfPayload::build(&label, &stats, html.clone());
        let document = self
            .bounded(Stage::Render, self.backend.render_pdf(&payload))
            .await?;

        self.transition(PipelineState::succeed)?;
        tracing::info!(
            bytes = document.len(),
            chunks_total,
            chunks_failed,
            "Report run completed"
        );

        Ok(ReportOutput {
            run_id,
            document,
            html,
            chunks_total,
            chunks_failed,
        })
    }

    /// Summarize every chunk, returning successful summaries in chunk order.
    async fn map_chunks(&self, conversations: &[&Conversation]) -> Result<(Vec<String>, usize)> {
        let chunks: Vec<&[&Conversation]> = conversations.chunks(self.config.chunk_size).collect();
        let total = chunks.len();
        let backend = self.backend.as_ref();
        let timeout = call_budget(&self.config);

        let mut results = stream::iter(chunks.into_iter().enumerate())
            .map(|(index, chunk)| async move {
                let outcome = tokio::time::timeout(timeout, backend.batch_analyze(chunk)).await;
                (index, chunk.len(), outcome)
            })
            .buffer_unordered(self.config.max_concurrent_chunks);

        let mut summaries: Vec<(usize, String)> = Vec::with_capacity(total);
        let mut attempted = 0usize;

        while let Some((index, size, outcome)) = results.next().await {
            attempted += 1;
            match outcome {
                Ok(Ok(summary)) => {
                    tracing::debug!(chunk = index + 1, size, "Chunk analyzed");
                    summaries.push((index, summary));
                }
                Ok(Err(e)) => {
                    tracing::warn!(chunk = index + 1, size, error = %e, "Chunk failed, excluding");
                }
                Err(_) => {
                    tracing::warn!(
                        chunk = index + 1,
                        size,
                        timeout_secs = timeout.as_secs(),
                        "Chunk timed out, excluding"
                    );
                }
            }
            let progress = progress_percent(attempted, total);
            self.transition(|s| s.advance(progress))?;
        }

        if summaries.is_empty() {
            return Err(Error::AllBatchesFailed);
        }

        summaries.sort_by_key(|(index, _)| *index);
        Ok((summaries.into_iter().map(|(_, s)| s).collect(), total))
    }

    /// Bound a backend call by its retry-inclusive budget.
    async fn bounded<T, F>(&self, stage: Stage, call: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let timeout = call_budget(&self.config);
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                stage,
                secs: timeout.as_secs(),
            }),
        }
    }

    /// Revert a terminal state to idle after the reset delay.
    fn schedule_reset(&self) {
        let state = Arc::clone(&self.state);
        let delay: Duration = self.config.reset_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.send_if_modified(|s| match s.reset() {
                Ok(next) => {
                    *s = next;
                    true
                }
                Err(_) => false,
            });
        });
    }
}

/// Stage a run-level error is reported against.
fn failed_stage(error: &Error) -> Stage {
    match error {
        Error::Remote { stage, .. } | Error::Timeout { stage, .. } => *stage,
        _ => Stage::Map,
    }
}

/// Message shown in the error state.
fn state_message(error: &Error) -> String {
    match error {
        Error::AllBatchesFailed | Error::Timeout { .. } => error.to_string(),
        _ => format!("{} failed", failed_stage(error)),
    }
}
