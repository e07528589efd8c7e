//! Batch report generation
//!
//! A report run maps transcript chunks through the remote `batch-analyze`
//! endpoint, reduces the surviving summaries together with aggregate stats
//! through `final-report`, and renders the result through `pdf`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use evalscope_core::report::{HttpReportBackend, ReportInput, ReportPipeline};
//!
//! let backend = Arc::new(HttpReportBackend::new(&config.report)?);
//! let pipeline = ReportPipeline::new(backend, config.report.clone());
//! let mut progress = pipeline.subscribe();
//!
//! let output = pipeline.run(ReportInput {
//!     conversations: store.within(range.as_ref()),
//!     date_range: range,
//!     registry: &config.agents,
//! }).await?;
//! std::fs::write("report.pdf", &output.document)?;
//! ```

mod client;
mod payload;
mod pipeline;
mod state;

pub use client::{call_budget, HttpReportBackend, ReportBackend};
pub use payload::{
    AnalyzeRequest, BatchAnalyzeRequest, ChatMessage, ChatRole, FinalReportRequest, PdfAgentRow, PdfKpis,
    PdfPayload, PdfStrategyRow, ReportStats,
};
pub use pipeline::{progress_percent, ReportInput, ReportOutput, ReportPipeline};
pub use state::{PipelineState, Stage};
