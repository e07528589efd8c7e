//! Per-day volume and duration series.

use crate::types::Conversation;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One calendar day of activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    /// Day label (`Aug 01`)
    pub date: String,
    #[serde(skip)]
    pub day: Option<NaiveDate>,
    pub count: usize,
    /// Mean duration, rounded to whole seconds
    pub avg_duration: u64,
}

/// Group conversations by UTC day, oldest day first.
pub fn daily_trend<'a, I>(conversations: I) -> Vec<TrendPoint>
where
    I: IntoIterator<Item = &'a Conversation>,
{
    let mut days: BTreeMap<NaiveDate, (usize, u64)> = BTreeMap::new();

    for c in conversations {
        let Some(started) = c.started_at() else {
            continue;
        };
        let entry = days.entry(started.date_naive()).or_default();
        entry.0 += 1;
        entry.1 += c.duration_secs();
    }

    days.into_iter()
        .map(|(day, (count, total))| TrendPoint {
            date: day.format("%b %d").to_string(),
            day: Some(day),
            count,
            avg_duration: (total as f64 / count as f64).round() as u64,
        })
        .collect()
}
