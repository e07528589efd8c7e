//! Live sampling for pinned stat items.
//!
//! Stat items only store their drill-down filter. Before they are sent to the
//! analysis endpoint, the filter is re-applied to the current store (without
//! any global date range) and the longest matching conversations are attached
//! as `sampleConversations`. Nothing is cached between queries.
//!
//! Sampling uses [`FilterState::matches_slice`]: a pinned mode cell only ever
//! samples conversations from that mode.

use serde_json::Value;

use crate::filter::FilterState;
use crate::store::TranscriptStore;
use crate::types::Conversation;

use super::{PinnedItem, PinnedKind};

/// Conversations attached to an enriched stat item.
pub const SAMPLE_SIZE: usize = 5;

/// Longest conversations matching `filter_state`, longest first.
pub fn sample_conversations<'a>(
    store: &'a TranscriptStore,
    filter_state: &FilterState,
) -> Vec<&'a Conversation> {
    let mut matches: Vec<&Conversation> = store
        .conversations()
        .iter()
        .filter(|c| filter_state.matches_slice(c, None))
        .collect();
    matches.sort_by(|a, b| b.duration_secs().cmp(&a.duration_secs()));
    matches.truncate(SAMPLE_SIZE);
    matches
}

/// Wire form of an item, with samples attached to stat items.
pub fn enrich_item(item: &PinnedItem, store: &TranscriptStore) -> Value {
    let mut value = serde_json::to_value(item).unwrap_or_default();

    let filter_state = match (&item.kind, &item.context) {
        (PinnedKind::StatRow | PinnedKind::StatSlice, Some(ctx)) => &ctx.filter,
        _ => return value,
    };

    let samples = sample_conversations(store, filter_state);
    tracing::debug!(id = %item.id, samples = samples.len(), "Enriched pinned item");

    let samples = serde_json::to_value(&samples).unwrap_or_default();
    match value.get_mut("data") {
        Some(Value::Object(data)) => {
            data.insert("sampleConversations".to_string(), samples);
        }
        Some(other) => {
            let original = other.take();
            *other = serde_json::json!({ "value": original, "sampleConversations": samples });
        }
        None => {}
    }
    value
}

/// Enrich every item, preserving order.
pub fn enrich_items(items: &[PinnedItem], store: &TranscriptStore) -> Vec<Value> {
    items.iter().map(|item| enrich_item(item, store)).collect()
}
