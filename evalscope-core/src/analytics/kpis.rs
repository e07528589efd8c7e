//! Headline numbers for a set of conversations.

use crate::format::ratio;
use crate::types::Conversation;
use serde::{Deserialize, Serialize};

/// Global KPIs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub total: usize,
    /// Deep-engagement conversations
    pub meaningful: usize,
    pub abandoned: usize,
    /// Mean call duration in seconds (0 when empty)
    pub avg_duration: f64,
}

impl Kpis {
    pub fn compute<'a, I>(conversations: I) -> Self
    where
        I: IntoIterator<Item = &'a Conversation>,
    {
        let mut kpis = Kpis::default();
        let mut total_duration = 0u64;

        for c in conversations {
            kpis.total += 1;
            total_duration += c.duration_secs();
            if c.is_deep() {
                kpis.meaningful += 1;
            }
            if c.is_abandoned() {
                kpis.abandoned += 1;
            }
        }

        if kpis.total > 0 {
            kpis.avg_duration = total_duration as f64 / kpis.total as f64;
        }
        kpis
    }

    pub fn meaningful_rate(&self) -> f64 {
        ratio(self.meaningful, self.total)
    }

    pub fn abandon_rate(&self) -> f64 {
        ratio(self.abandoned, self.total)
    }
}
