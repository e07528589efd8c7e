//! Analytics module for evalscope
//!
//! Turns a (date-bounded) slice of the transcript store into:
//! - Global KPIs
//! - Per-dimension aggregate buckets (agent, interaction mode, context type, prompt)
//! - A per-day trend series
//!
//! All functions here are pure and synchronous; the report pipeline and the
//! CLI call the same code so their numbers always agree.

pub mod aggregate;
pub mod kpis;
pub mod trend;

pub use aggregate::{
    aggregate, sort_buckets, AggregateBucket, BucketSortKey, Dimension, MetricColumn, Summary,
};
pub use kpis::Kpis;
pub use trend::{daily_trend, TrendPoint};

use crate::config::AgentRegistry;
use crate::types::Conversation;
use serde::Serialize;

/// Everything the statistics view shows for one input slice.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub kpis: Kpis,
    pub agents: Vec<AggregateBucket>,
    pub modes: Vec<AggregateBucket>,
    pub context_types: Vec<AggregateBucket>,
    pub prompts: Vec<AggregateBucket>,
    pub trend: Vec<TrendPoint>,
}

impl Overview {
    pub fn compute(conversations: &[&Conversation], registry: &AgentRegistry) -> Self {
        let view = || conversations.iter().copied();
        let overview = Self {
            kpis: Kpis::compute(view()),
            agents: aggregate(view(), Dimension::Agent, registry),
            modes: aggregate(view(), Dimension::Mode, registry),
            context_types: aggregate(view(), Dimension::ContextType, registry),
            prompts: aggregate(view(), Dimension::PromptTitle, registry),
            trend: daily_trend(view()),
        };

        tracing::debug!(
            conversations = conversations.len(),
            agents = overview.agents.len(),
            context_types = overview.context_types.len(),
            days = overview.trend.len(),
            "Computed overview"
        );

        overview
    }

    /// Bucket table for a dimension.
    pub fn buckets(&self, dimension: Dimension) -> &[AggregateBucket] {
        match dimension {
            Dimension::Agent => &self.agents,
            Dimension::Mode => &self.modes,
            Dimension::ContextType => &self.context_types,
            Dimension::PromptTitle => &self.prompts,
        }
    }

    pub fn buckets_mut(&mut self, dimension: Dimension) -> &mut Vec<AggregateBucket> {
        match dimension {
            Dimension::Agent => &mut self.agents,
            Dimension::Mode => &mut self.modes,
            Dimension::ContextType => &mut self.context_types,
            Dimension::PromptTitle => &mut self.prompts,
        }
    }
}
