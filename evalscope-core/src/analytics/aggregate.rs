//! Per-dimension aggregation buckets.
//!
//! A single pass over the input resolves each conversation's bucket key,
//! creates the bucket lazily and accumulates raw counts and samples. Rates and
//! summaries are derived at read time from the raw fields so that table output,
//! workbench pins and the report payload all agree.

use crate::config::AgentRegistry;
use crate::filter::{FilterState, FilterType, SortConfig, SortDirection};
use crate::format::ratio;
use crate::types::{Conversation, InteractionMode};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

/// Axis a bucket view groups conversations by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    Agent,
    Mode,
    ContextType,
    PromptTitle,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Agent,
        Dimension::Mode,
        Dimension::ContextType,
        Dimension::PromptTitle,
    ];

    /// Short name used in stat-row identifiers.
    pub fn slug(&self) -> &'static str {
        match self {
            Dimension::Agent => "agent",
            Dimension::Mode => "mode",
            Dimension::ContextType => "type",
            Dimension::PromptTitle => "prompt",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Dimension::Agent => "Agents",
            Dimension::Mode => "Interaction Modes",
            Dimension::ContextType => "Context Types",
            Dimension::PromptTitle => "Prompts",
        }
    }

    /// Only the advisor agent's sessions feed this view.
    pub fn advisor_only(&self) -> bool {
        !matches!(self, Dimension::Agent)
    }
}

/// `(min, avg, max)` of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub min: u64,
    pub avg: f64,
    pub max: u64,
}

impl Summary {
    /// Summarize a sample; `0 / 0.0 / 0` when empty.
    pub fn of<I: IntoIterator<Item = u64>>(values: I) -> Self {
        let mut count = 0u64;
        let mut sum = 0u64;
        let mut min = u64::MAX;
        let mut max = 0u64;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        if count == 0 {
            return Summary::default();
        }
        Summary {
            min,
            avg: sum as f64 / count as f64,
            max,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {:.1} / {}", self.min, self.avg, self.max)
    }
}

/// Raw statistics for one group of conversations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateBucket {
    pub dimension: Dimension,
    pub key: String,
    pub label: String,
    pub count: usize,
    pub abandoned_count: usize,
    pub deep_count: usize,
    pub tool_use_count: usize,
    pub total_tool_calls: u64,
    pub successful_tool_calls: u64,
    pub durations: Vec<u64>,
    pub turns: Vec<usize>,
    /// Filter selecting exactly this bucket's population
    #[serde(skip)]
    pub scope: FilterState,
}

impl AggregateBucket {
    pub fn new(dimension: Dimension, key: impl Into<String>, label: impl Into<String>, scope: FilterState) -> Self {
        Self {
            dimension,
            key: key.into(),
            label: label.into(),
            count: 0,
            abandoned_count: 0,
            deep_count: 0,
            tool_use_count: 0,
            total_tool_calls: 0,
            successful_tool_calls: 0,
            durations: Vec::new(),
            turns: Vec::new(),
            scope,
        }
    }

    /// Fold one conversation into the bucket.
    pub fn record(&mut self, c: &Conversation) {
        self.count += 1;
        self.durations.push(c.duration_secs());
        self.turns.push(c.turn_count());

        if c.is_abandoned() {
            self.abandoned_count += 1;
        }
        if c.is_deep() {
            self.deep_count += 1;
        }
        if c.used_tools() {
            self.tool_use_count += 1;
        }

        let (total, ok) = c.tool_result_tally();
        self.total_tool_calls += total;
        self.successful_tool_calls += ok;
    }

    pub fn abandon_rate(&self) -> f64 {
        ratio(self.abandoned_count, self.count)
    }

    pub fn deep_rate(&self) -> f64 {
        ratio(self.deep_count, self.count)
    }

    pub fn tool_use_rate(&self) -> f64 {
        ratio(self.tool_use_count, self.count)
    }

    /// Share of successful tool results; `None` when no tool ran.
    pub fn func_success_rate(&self) -> Option<f64> {
        if self.total_tool_calls == 0 {
            None
        } else {
            Some(self.successful_tool_calls as f64 / self.total_tool_calls as f64)
        }
    }

    pub fn duration_summary(&self) -> Summary {
        Summary::of(self.durations.iter().copied())
    }

    pub fn turns_summary(&self) -> Summary {
        Summary::of(self.turns.iter().map(|&t| t as u64))
    }

    /// Filter that drills into this bucket for a metric column.
    pub fn drill_down(&self, column: MetricColumn) -> FilterState {
        self.scope.clone().with_filter_type(column.filter_type())
    }

    /// Stable identifier used when the row is pinned.
    pub fn pin_id(&self) -> String {
        format!("stat-{}-{}", self.dimension.slug(), self.key)
    }
}

/// Metric column of a bucket table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricColumn {
    Count,
    AbandonRate,
    DeepRate,
    ToolUseRate,
    FuncSuccessRate,
}

impl MetricColumn {
    /// Outcome category a click on this column drills into.
    pub fn filter_type(&self) -> FilterType {
        match self {
            MetricColumn::Count => FilterType::All,
            MetricColumn::AbandonRate => FilterType::Short,
            MetricColumn::DeepRate => FilterType::Long,
            MetricColumn::ToolUseRate => FilterType::ToolUsed,
            MetricColumn::FuncSuccessRate => FilterType::ToolFailure,
        }
    }
}

/// Build the bucket view for one dimension.
///
/// Agent and mode views are pre-seeded (registered agents, both modes) and
/// drop buckets that stayed empty. Mode, context-type and prompt views only
/// consider the advisor agent's conversations.
pub fn aggregate<'a, I>(conversations: I, dimension: Dimension, registry: &AgentRegistry) -> Vec<AggregateBucket>
where
    I: IntoIterator<Item = &'a Conversation>,
{
    let mut buckets: Vec<AggregateBucket> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    let advisor_scope = || FilterState::agent(registry.advisor_id.clone());

    match dimension {
        Dimension::Agent => {
            for (id, name) in &registry.names {
                index.insert(id.clone(), buckets.len());
                buckets.push(AggregateBucket::new(dimension, id, name, FilterState::agent(id.clone())));
            }
        }
        Dimension::Mode => {
            for mode in InteractionMode::ALL {
                index.insert(mode.as_str().to_string(), buckets.len());
                let scope = FilterState {
                    interaction_mode: Some(mode),
                    ..advisor_scope()
                };
                buckets.push(AggregateBucket::new(dimension, mode.as_str(), mode.display_name(), scope));
            }
        }
        Dimension::ContextType | Dimension::PromptTitle => {}
    }

    for c in conversations {
        if dimension.advisor_only() && c.agent_id != registry.advisor_id {
            continue;
        }

        let key = match dimension {
            Dimension::Agent => c.agent_id.as_str(),
            Dimension::Mode => c.interaction_mode().as_str(),
            Dimension::ContextType => c.context_type_or_default(),
            Dimension::PromptTitle => c.context_title_or_default(),
        };

        let slot = match index.get(key) {
            Some(&slot) => slot,
            // Only registered agents have a row.
            None if dimension == Dimension::Agent => continue,
            None => {
                let (label, scope) = match dimension {
                    Dimension::ContextType => (
                        key.to_string(),
                        FilterState {
                            context_type: Some(key.to_string()),
                            ..advisor_scope()
                        },
                    ),
                    Dimension::PromptTitle => (
                        key.to_string(),
                        FilterState {
                            context_title: Some(key.to_string()),
                            ..advisor_scope()
                        },
                    ),
                    // Agents and both modes are pre-seeded.
                    Dimension::Agent | Dimension::Mode => (key.to_string(), advisor_scope()),
                };
                index.insert(key.to_string(), buckets.len());
                buckets.push(AggregateBucket::new(dimension, key, label, scope));
                buckets.len() - 1
            }
        };

        buckets[slot].record(c);
    }

    buckets.retain(|b| b.count > 0);
    sort_buckets(&mut buckets, &SortConfig::new(BucketSortKey::Count, SortDirection::Desc));
    buckets
}

/// Column a bucket table can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BucketSortKey {
    Key,
    #[default]
    Count,
    AbandonRate,
    DeepRate,
    ToolUseRate,
    FuncSuccessRate,
    DurationAvg,
    TurnsAvg,
}

impl BucketSortKey {
    fn compare(&self, a: &AggregateBucket, b: &AggregateBucket) -> Ordering {
        match self {
            BucketSortKey::Key => a.key.cmp(&b.key),
            BucketSortKey::Count => a.count.cmp(&b.count),
            BucketSortKey::AbandonRate => a.abandon_rate().total_cmp(&b.abandon_rate()),
            BucketSortKey::DeepRate => a.deep_rate().total_cmp(&b.deep_rate()),
            BucketSortKey::ToolUseRate => a.tool_use_rate().total_cmp(&b.tool_use_rate()),
            BucketSortKey::FuncSuccessRate => a
                .func_success_rate()
                .unwrap_or(0.0)
                .total_cmp(&b.func_success_rate().unwrap_or(0.0)),
            BucketSortKey::DurationAvg => a.duration_summary().avg.total_cmp(&b.duration_summary().avg),
            BucketSortKey::TurnsAvg => a.turns_summary().avg.total_cmp(&b.turns_summary().avg),
        }
    }
}

impl FromStr for BucketSortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "key" | "name" => Ok(BucketSortKey::Key),
            "count" => Ok(BucketSortKey::Count),
            "abandon" | "abandon-rate" => Ok(BucketSortKey::AbandonRate),
            "deep" | "deep-rate" => Ok(BucketSortKey::DeepRate),
            "tool-use" | "tool-use-rate" => Ok(BucketSortKey::ToolUseRate),
            "func-success" | "func-success-rate" => Ok(BucketSortKey::FuncSuccessRate),
            "duration" | "duration-avg" => Ok(BucketSortKey::DurationAvg),
            "turns" | "turns-avg" => Ok(BucketSortKey::TurnsAvg),
            _ => Err(format!(
                "unknown sort key '{}' (expected key, count, abandon, deep, tool-use, func-success, duration, turns)",
                s
            )),
        }
    }
}

/// Stable sort of a bucket table; metrics are recomputed from raw fields.
pub fn sort_buckets(buckets: &mut [AggregateBucket], config: &SortConfig<BucketSortKey>) {
    buckets.sort_by(|a, b| config.direction.apply(config.key.compare(a, b)));
}
