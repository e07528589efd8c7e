//! Filter and sort engine
//!
//! Pure functions deriving an ordered view of the transcript store from a
//! [`FilterState`] and a [`SortConfig`]. Every predicate in a filter state is
//! independent and the present ones are ANDed; an absent field places no
//! constraint.
//!
//! Date handling follows a precedence chain:
//! 1. `startDate` + `endDate`: inclusive UTC day range
//! 2. `date`: legacy single-day label (`Aug 01`)
//! 3. the caller's global date range
//! 4. no date constraint

use crate::store::TranscriptStore;
use crate::types::{Conversation, InteractionMode};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

// ============================================
// Filter types
// ============================================

/// Outcome category used by drill-downs and the explorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterType {
    #[default]
    All,
    #[serde(rename = "Tech Failure", alias = "TechFailure")]
    TechFailure,
    #[serde(rename = "Short (<15s)", alias = "Short")]
    Short,
    #[serde(rename = "Long (>60s)", alias = "Long")]
    Long,
    #[serde(rename = "Tool Used", alias = "ToolUsed")]
    ToolUsed,
    #[serde(rename = "Tool Failure", alias = "ToolFailure")]
    ToolFailure,
}

impl FilterType {
    /// Whether a conversation falls into this category.
    pub fn matches(&self, c: &Conversation) -> bool {
        match self {
            FilterType::All => true,
            FilterType::TechFailure => c.is_tech_failure(),
            FilterType::Short => c.is_abandoned(),
            FilterType::Long => c.is_deep(),
            FilterType::ToolUsed => c.used_tools(),
            FilterType::ToolFailure => c.has_tool_failure(),
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            FilterType::All => "All",
            FilterType::TechFailure => "Tech Failure",
            FilterType::Short => "Short (<15s)",
            FilterType::Long => "Long (>60s)",
            FilterType::ToolUsed => "Tool Used",
            FilterType::ToolFailure => "Tool Failure",
        }
    }
}

impl std::fmt::Display for FilterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FilterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "all" => Ok(FilterType::All),
            "tech-failure" | "techfailure" => Ok(FilterType::TechFailure),
            "short" => Ok(FilterType::Short),
            "long" => Ok(FilterType::Long),
            "tool-used" | "toolused" => Ok(FilterType::ToolUsed),
            "tool-failure" | "toolfailure" => Ok(FilterType::ToolFailure),
            _ => Err(format!(
                "unknown filter type '{}' (expected all, tech-failure, short, long, tool-used, tool-failure)",
                s
            )),
        }
    }
}

/// Inclusive range of UTC calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// First second of `start`, unix seconds.
    pub fn start_ts(&self) -> i64 {
        self.start.and_time(NaiveTime::MIN).and_utc().timestamp()
    }

    /// Last second of `end` (23:59:59), unix seconds.
    pub fn end_ts(&self) -> i64 {
        self.end.and_time(NaiveTime::MIN).and_utc().timestamp() + 86_399
    }

    pub fn contains(&self, c: &Conversation) -> bool {
        let ts = c.metadata.start_time_unix_secs;
        ts >= self.start_ts() && ts <= self.end_ts()
    }
}

/// Sparse set of optional predicates.
///
/// The serialized form (camelCase, absent fields omitted) is canonical: equal
/// filter states always serialize to the same string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_title: Option<String>,
    /// Legacy single-day label (`Aug 01`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_mode: Option<InteractionMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_type: Option<FilterType>,
}

impl FilterState {
    pub fn agent(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            ..Default::default()
        }
    }

    pub fn with_filter_type(mut self, filter_type: FilterType) -> Self {
        self.filter_type = Some(filter_type);
        self
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.start_date = Some(range.start);
        self.end_date = Some(range.end);
        self
    }

    /// The explicit day range, when both ends are set.
    pub fn explicit_range(&self) -> Option<DateRange> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Some(DateRange::new(start, end)),
            _ => None,
        }
    }

    /// Canonical JSON form, used to derive stable identifiers.
    pub fn canonical_json(&self) -> String {
        // Plain struct of strings, dates and unit enums; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Whether `c` satisfies every present predicate, as the explorer sees it.
    ///
    /// The mode predicate only constrains the unqualified view; an explicit
    /// category wins over it.
    pub fn matches(&self, c: &Conversation, global: Option<&DateRange>) -> bool {
        let filter_type = self.filter_type.unwrap_or_default();
        let mode_ok = filter_type != FilterType::All || self.matches_mode(c);
        mode_ok && self.matches_scope(c, global) && filter_type.matches(c)
    }

    /// Whether `c` belongs to the slice this state describes.
    ///
    /// Unlike [`matches`](Self::matches) the mode predicate always applies, so
    /// a mode bucket's rate drill-down stays inside that mode.
    pub fn matches_slice(&self, c: &Conversation, global: Option<&DateRange>) -> bool {
        self.matches_mode(c)
            && self.matches_scope(c, global)
            && self.filter_type.unwrap_or_default().matches(c)
    }

    fn matches_mode(&self, c: &Conversation) -> bool {
        self.interaction_mode.map_or(true, |mode| c.interaction_mode() == mode)
    }

    /// Agent, context and date predicates.
    fn matches_scope(&self, c: &Conversation, global: Option<&DateRange>) -> bool {
        if let Some(agent_id) = &self.agent_id {
            if c.agent_id != *agent_id {
                return false;
            }
        }
        if let Some(context_type) = &self.context_type {
            if c.context_type() != Some(context_type.as_str()) {
                return false;
            }
        }
        if let Some(context_title) = &self.context_title {
            if c.context_title() != Some(context_title.as_str()) {
                return false;
            }
        }

        if let Some(range) = self.explicit_range() {
            range.contains(c)
        } else if let Some(label) = &self.date {
            c.day_label() == *label
        } else {
            global.map_or(true, |range| range.contains(c))
        }
    }
}

/// Apply a filter state to a collection, preserving input order.
pub fn filter<'a, I>(
    conversations: I,
    state: &FilterState,
    global: Option<&DateRange>,
) -> Vec<&'a Conversation>
where
    I: IntoIterator<Item = &'a Conversation>,
{
    conversations
        .into_iter()
        .filter(|c| state.matches(c, global))
        .collect()
}

/// Free-text search: id substring or case-insensitive title substring.
pub fn matches_search(c: &Conversation, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    if c.id.contains(query) {
        return true;
    }
    let needle = query.to_lowercase();
    c.context_title()
        .map(|title| title.to_lowercase().contains(&needle))
        .unwrap_or(false)
}

// ============================================
// Sorting
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    /// Apply the direction to an ascending ordering.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Column the conversation list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Date,
    Context,
    Duration,
    Turns,
    Status,
}

impl SortKey {
    fn compare(&self, a: &Conversation, b: &Conversation) -> Ordering {
        match self {
            SortKey::Date => a
                .metadata
                .start_time_unix_secs
                .cmp(&b.metadata.start_time_unix_secs),
            SortKey::Context => a
                .context_title_or_default()
                .cmp(b.context_title_or_default()),
            SortKey::Duration => a.duration_secs().cmp(&b.duration_secs()),
            SortKey::Turns => a.turn_count().cmp(&b.turn_count()),
            // Tech failures first when ascending.
            SortKey::Status => (!a.is_tech_failure()).cmp(&!b.is_tech_failure()),
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "date" => Ok(SortKey::Date),
            "context" => Ok(SortKey::Context),
            "duration" => Ok(SortKey::Duration),
            "turns" => Ok(SortKey::Turns),
            "status" => Ok(SortKey::Status),
            _ => Err(format!(
                "unknown sort key '{}' (expected date, context, duration, turns, status)",
                s
            )),
        }
    }
}

/// Sort column plus direction, with header-click toggle semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortConfig<K = SortKey> {
    pub key: K,
    pub direction: SortDirection,
}

impl<K: Copy + PartialEq> SortConfig<K> {
    pub fn new(key: K, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Select a column: the same key flips direction, a new key starts descending.
    pub fn toggle(&mut self, key: K) {
        if self.key == key {
            self.direction = self.direction.flipped();
        } else {
            self.key = key;
            self.direction = SortDirection::Desc;
        }
    }
}

/// Stable sort of a conversation view.
pub fn sort(conversations: &mut [&Conversation], config: &SortConfig) {
    conversations.sort_by(|a, b| config.direction.apply(config.key.compare(a, b)));
}

// ============================================
// Explorer
// ============================================

/// Everything the conversation explorer needs to build its list.
#[derive(Debug, Clone, Default)]
pub struct ExplorerQuery {
    pub filter: FilterState,
    pub search: String,
    pub sort: SortConfig,
    /// Global date range, used when the filter has no date predicate
    pub date_range: Option<DateRange>,
}

/// Filter, search and sort in one pass, returning references in display order.
pub fn explore<'a>(store: &'a TranscriptStore, query: &ExplorerQuery) -> Vec<&'a Conversation> {
    let mut view: Vec<&Conversation> = store
        .conversations()
        .iter()
        .filter(|c| query.filter.matches(c, query.date_range.as_ref()))
        .filter(|c| matches_search(c, &query.search))
        .collect();
    sort(&mut view, &query.sort);
    view
}
