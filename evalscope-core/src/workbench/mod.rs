//! Analyst workbench
//!
//! A registry of pinned items (single conversations, aggregate rows and
//! filtered slices) that are handed to the remote analysis endpoint as
//! context. Items are keyed by a stable identifier, so pinning the same thing
//! twice is a no-op.
//!
//! The workbench is an ordinary value owned by its caller; there is no global
//! instance.

mod chat;
mod enrich;

pub use chat::{AnalysisSession, ANALYSIS_ERROR_REPLY};
pub use enrich::{enrich_item, enrich_items, sample_conversations, SAMPLE_SIZE};

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::analytics::{AggregateBucket, MetricColumn};
use crate::filter::FilterState;
use crate::format::{format_percent, format_percent_opt};
use crate::types::Conversation;

/// How long the "Added ..." notification stays visible.
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(3);

/// What a pinned item refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PinnedKind {
    Conversation,
    StatRow,
    StatSlice,
}

/// Drill-down context of a stat item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinContext {
    pub metric: String,
    pub value: serde_json::Value,
    pub filter: FilterState,
}

/// One entry on the workbench.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinnedItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: PinnedKind,
    pub label: String,
    /// Snapshot taken when the item was pinned
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<PinContext>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// Identifier of a slice, derived from the filter's canonical JSON.
pub fn slice_id(filter: &FilterState) -> String {
    let digest = Sha256::digest(filter.canonical_json().as_bytes());
    format!("slice-{}", hex::encode(digest))
}

impl PinnedItem {
    /// Pin a single conversation.
    pub fn conversation(c: &Conversation) -> Self {
        let short: String = c.id.chars().take(8).collect();
        Self {
            id: c.id.clone(),
            kind: PinnedKind::Conversation,
            label: format!("Conv: {}...", short),
            data: serde_json::to_value(c).unwrap_or_default(),
            context: None,
            timestamp: Utc::now(),
        }
    }

    /// Pin a whole aggregate row.
    pub fn stat_row(bucket: &AggregateBucket) -> Self {
        let data = serde_json::json!({
            "dimension": bucket.dimension,
            "key": bucket.key,
            "name": bucket.label,
            "count": bucket.count,
            "abandonRate": format_percent(bucket.abandon_rate()),
            "deepRate": format_percent(bucket.deep_rate()),
            "toolUse": format_percent(bucket.tool_use_rate()),
            "funcSuccess": format_percent_opt(bucket.func_success_rate()),
            "duration": bucket.duration_summary().to_string(),
            "turns": bucket.turns_summary().to_string(),
        });
        Self {
            id: bucket.pin_id(),
            kind: PinnedKind::StatRow,
            label: bucket.label.clone(),
            data,
            context: Some(PinContext {
                metric: "count".to_string(),
                value: bucket.count.into(),
                filter: bucket.drill_down(MetricColumn::Count),
            }),
            timestamp: Utc::now(),
        }
    }

    /// Pin one metric cell of an aggregate row.
    pub fn bucket_cell(bucket: &AggregateBucket, column: MetricColumn) -> Self {
        let (metric, value): (&str, serde_json::Value) = match column {
            MetricColumn::Count => ("Count", bucket.count.into()),
            MetricColumn::AbandonRate => ("Abandon Rate", format_percent(bucket.abandon_rate()).into()),
            MetricColumn::DeepRate => ("Deep Engagement", format_percent(bucket.deep_rate()).into()),
            MetricColumn::ToolUseRate => ("Tool Use", format_percent(bucket.tool_use_rate()).into()),
            MetricColumn::FuncSuccessRate => (
                "Function Success",
                format_percent_opt(bucket.func_success_rate()).into(),
            ),
        };
        Self::slice(
            format!("{}: {}", bucket.label, metric),
            metric,
            value,
            bucket.drill_down(column),
        )
    }

    /// Pin an arbitrary filtered slice.
    pub fn slice(
        label: impl Into<String>,
        metric: impl Into<String>,
        value: serde_json::Value,
        filter: FilterState,
    ) -> Self {
        let metric = metric.into();
        Self {
            id: slice_id(&filter),
            kind: PinnedKind::StatSlice,
            label: label.into(),
            data: serde_json::json!({ "metric": metric, "value": value }),
            context: Some(PinContext {
                metric,
                value,
                filter,
            }),
            timestamp: Utc::now(),
        }
    }
}

/// Whether [`Workbench::add`] inserted the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPinned,
}

#[derive(Debug, Clone)]
struct Notification {
    message: String,
    shown_at: Instant,
}

/// Pinned-item registry.
#[derive(Debug, Clone)]
pub struct Workbench {
    items: Vec<PinnedItem>,
    notification: Option<Notification>,
    notification_ttl: Duration,
}

impl Default for Workbench {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbench {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            notification: None,
            notification_ttl: NOTIFICATION_TTL,
        }
    }

    /// Pin an item. First write wins; re-adding an id changes nothing but
    /// the notification.
    pub fn add(&mut self, mut item: PinnedItem) -> AddOutcome {
        if self.is_pinned(&item.id) {
            tracing::debug!(id = %item.id, "Item already pinned");
            self.notify(format!("\"{}\" is already in Workbench", item.label));
            return AddOutcome::AlreadyPinned;
        }

        self.notify(format!("Added \"{}\" to Workbench", item.label));
        item.timestamp = Utc::now();
        tracing::debug!(id = %item.id, kind = ?item.kind, "Pinned item");
        self.items.push(item);
        AddOutcome::Added
    }

    fn notify(&mut self, message: String) {
        self.notification = Some(Notification {
            message,
            shown_at: Instant::now(),
        });
    }

    /// Unpin by id. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        self.items.len() != before
    }

    /// Pin when absent, unpin when present. Returns whether the item is pinned afterwards.
    pub fn toggle(&mut self, item: PinnedItem) -> bool {
        if self.remove(&item.id) {
            false
        } else {
            self.add(item);
            true
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_pinned(&self, id: &str) -> bool {
        self.items.iter().any(|i| i.id == id)
    }

    /// Items in pin order.
    pub fn items(&self) -> &[PinnedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current notification, if it has not expired.
    pub fn notification(&self) -> Option<&str> {
        self.notification_at(Instant::now())
    }

    /// Notification as seen at `now`.
    pub fn notification_at(&self, now: Instant) -> Option<&str> {
        self.notification
            .as_ref()
            .filter(|n| now.saturating_duration_since(n.shown_at) < self.notification_ttl)
            .map(|n| n.message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{aggregate, Dimension};
    use crate::config::AgentRegistry;
    use crate::filter::FilterType;
    use crate::types::test_support::conversation;

    #[test]
    fn test_add_is_idempotent() {
        let c = conversation("abcdefghijkl", "a", 10, 1);
        let mut wb = Workbench::new();

        assert_eq!(wb.add(PinnedItem::conversation(&c)), AddOutcome::Added);
        let snapshot = wb.items().to_vec();
        assert_eq!(wb.add(PinnedItem::conversation(&c)), AddOutcome::AlreadyPinned);
        assert_eq!(
            wb.notification(),
            Some("\"Conv: abcdefgh...\" is already in Workbench")
        );

        assert_eq!(wb.items(), snapshot.as_slice());
        assert_eq!(wb.items()[0].label, "Conv: abcdefgh...");
        assert!(wb.is_pinned("abcdefghijkl"));
    }

    #[test]
    fn test_remove_restores_previous_state() {
        let mut wb = Workbench::new();
        wb.add(PinnedItem::conversation(&conversation("one", "a", 10, 1)));
        let before = wb.items().to_vec();

        let item = PinnedItem::conversation(&conversation("two", "a", 10, 1));
        let id = item.id.clone();
        wb.add(item);
        assert!(wb.remove(&id));
        assert_eq!(wb.items(), before.as_slice());
        assert!(!wb.remove(&id));
    }

    #[test]
    fn test_equal_filters_share_one_slice() {
        let a = FilterState::agent("blue").with_filter_type(FilterType::Short);
        let b = FilterState::agent("blue").with_filter_type(FilterType::Short);
        let mut wb = Workbench::new();

        wb.add(PinnedItem::slice("Blue: Abandon", "Abandon Rate", "12.0%".into(), a));
        wb.add(PinnedItem::slice("Blue again", "Abandon Rate", "12.0%".into(), b));
        assert_eq!(wb.len(), 1);
        assert_eq!(wb.items()[0].label, "Blue: Abandon");
        assert!(wb.items()[0].id.starts_with("slice-"));
    }

    #[test]
    fn test_distinct_filters_get_distinct_ids() {
        let a = slice_id(&FilterState::agent("blue"));
        let b = slice_id(&FilterState::agent("red"));
        assert_ne!(a, b);
        assert_eq!(a.len(), "slice-".len() + 64);
    }

    #[test]
    fn test_toggle() {
        let c = conversation("c1", "a", 10, 1);
        let mut wb = Workbench::new();
        assert!(wb.toggle(PinnedItem::conversation(&c)));
        assert!(!wb.toggle(PinnedItem::conversation(&c)));
        assert!(wb.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut wb = Workbench::new();
        wb.add(PinnedItem::conversation(&conversation("x", "a", 10, 1)));
        wb.add(PinnedItem::conversation(&conversation("y", "a", 10, 1)));
        wb.clear();
        assert!(wb.is_empty());
    }

    #[test]
    fn test_notification_expires() {
        let mut wb = Workbench::new();
        assert!(wb.notification().is_none());

        wb.add(PinnedItem::conversation(&conversation("c1", "a", 10, 1)));
        let now = Instant::now();
        assert_eq!(wb.notification_at(now), Some("Added \"Conv: c1...\" to Workbench"));
        assert!(wb.notification_at(now + Duration::from_secs(4)).is_none());
    }

    #[test]
    fn test_stat_items_carry_drill_down() {
        let mut registry = AgentRegistry::default();
        registry.names.insert("agent_x".to_string(), "Agent X".to_string());
        let convs = vec![conversation("a", "agent_x", 10, 1)];
        let buckets = aggregate(&convs, Dimension::Agent, &registry);

        let row = PinnedItem::stat_row(&buckets[0]);
        assert_eq!(row.id, "stat-agent-agent_x");
        assert_eq!(row.kind, PinnedKind::StatRow);
        let ctx = row.context.unwrap();
        assert_eq!(ctx.filter.agent_id.as_deref(), Some("agent_x"));

        let cell = PinnedItem::bucket_cell(&buckets[0], MetricColumn::AbandonRate);
        assert_eq!(cell.kind, PinnedKind::StatSlice);
        assert_eq!(cell.label, "Agent X: Abandon Rate");
        assert_eq!(cell.context.unwrap().filter.filter_type, Some(FilterType::Short));
    }

    #[test]
    fn test_pinned_item_wire_format() {
        let item = PinnedItem::slice("s", "Count", 3.into(), FilterState::agent("blue"));
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "stat-slice");
        assert_eq!(value["context"]["filter"]["agentId"], "blue");
        assert!(value["timestamp"].is_i64());
    }
}
