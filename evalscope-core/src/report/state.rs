//! Report pipeline state machine
//!
//! ```text
//! idle ──start──► processing(0..=100) ──synthesize──► synthesizing
//!                      │                                   │
//!                      │                                 render
//!                      │                                   ▼
//!                      └────────fail────────►  error ◄── rendering ──succeed──► success
//!                                                │                                 │
//!                                                └────────────reset────────────────┴──► idle
//! ```
//!
//! Every transition is an explicit method returning the next state; anything
//! not drawn above is rejected with [`Error::InvalidTransition`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Per-chunk batch analysis
    Map,
    /// Final report synthesis
    Synthesize,
    /// Document rendering
    Render,
    /// Workbench analysis query (outside the pipeline)
    Analyze,
}

impl Stage {
    /// Endpoint path, relative to the configured base URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Stage::Map => "api/evals/batch-analyze",
            Stage::Synthesize => "api/evals/final-report",
            Stage::Render => "api/evals/pdf",
            Stage::Analyze => "api/evals/analyze",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Map => "batch analysis",
            Stage::Synthesize => "report synthesis",
            Stage::Render => "PDF rendering",
            Stage::Analyze => "analysis query",
        };
        f.write_str(name)
    }
}

/// Observable state of the single report run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PipelineState {
    #[default]
    Idle,
    Processing {
        /// Attempted chunks as a percentage of all chunks
        progress: u8,
    },
    Synthesizing,
    Rendering,
    Success,
    Error {
        stage: Stage,
        message: String,
    },
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Processing { .. } => "processing",
            PipelineState::Synthesizing => "synthesizing",
            PipelineState::Rendering => "rendering",
            PipelineState::Success => "success",
            PipelineState::Error { .. } => "error",
        }
    }

    /// Short text for a status button or progress bar.
    pub fn status_line(&self) -> String {
        match self {
            PipelineState::Idle => "Generate Report".to_string(),
            PipelineState::Processing { progress } => format!("Analyzing ({}%)", progress),
            PipelineState::Synthesizing => "Synthesizing...".to_string(),
            PipelineState::Rendering => "Creating PDF...".to_string(),
            PipelineState::Success => "Done!".to_string(),
            PipelineState::Error { .. } => "Failed".to_string(),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, PipelineState::Idle)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Success | PipelineState::Error { .. })
    }

    pub fn progress(&self) -> Option<u8> {
        match self {
            PipelineState::Processing { progress } => Some(*progress),
            _ => None,
        }
    }

    fn reject(&self, event: &str) -> Error {
        Error::InvalidTransition {
            from: self.name().to_string(),
            event: event.to_string(),
        }
    }

    /// idle → processing(0)
    pub fn start(&self) -> Result<Self> {
        match self {
            PipelineState::Idle => Ok(PipelineState::Processing { progress: 0 }),
            _ => Err(self.reject("start")),
        }
    }

    /// processing(p) → processing(q), with p ≤ q ≤ 100
    pub fn advance(&self, progress: u8) -> Result<Self> {
        match self {
            PipelineState::Processing { progress: current }
                if progress >= *current && progress <= 100 =>
            {
                Ok(PipelineState::Processing { progress })
            }
            _ => Err(self.reject("advance")),
        }
    }

    /// processing → synthesizing
    pub fn synthesize(&self) -> Result<Self> {
        match self {
            PipelineState::Processing { .. } => Ok(PipelineState::Synthesizing),
            _ => Err(self.reject("synthesize")),
        }
    }

    /// synthesizing → rendering
    pub fn render(&self) -> Result<Self> {
        match self {
            PipelineState::Synthesizing => Ok(PipelineState::Rendering),
            _ => Err(self.reject("render")),
        }
    }

    /// rendering → success
    pub fn succeed(&self) -> Result<Self> {
        match self {
            PipelineState::Rendering => Ok(PipelineState::Success),
            _ => Err(self.reject("succeed")),
        }
    }

    /// any running state → error
    pub fn fail(&self, stage: Stage, message: impl Into<String>) -> Result<Self> {
        match self {
            PipelineState::Processing { .. }
            | PipelineState::Synthesizing
            | PipelineState::Rendering => Ok(PipelineState::Error {
                stage,
                message: message.into(),
            }),
            _ => Err(self.reject("fail")),
        }
    }

    /// success | error → idle
    pub fn reset(&self) -> Result<Self> {
        if self.is_terminal() {
            Ok(PipelineState::Idle)
        } else {
            Err(self.reject("reset"))
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status_line())
    }
}
