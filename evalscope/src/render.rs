//! Plain-text rendering for the `stats` and `explore` commands.

use evalscope_core::analytics::{AggregateBucket, Dimension, Overview};
use evalscope_core::format::{
    format_date_range, format_percent, format_percent_opt, format_secs_rounded,
};
use evalscope_core::{Conversation, DateRange};
use serde::Serialize;

/// Truncate a string to `max` characters, marking the cut with `...`.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

pub fn print_overview(overview: &Overview, range: Option<&DateRange>) {
    let kpis = &overview.kpis;

    println!(
        "Conversations: {} ({})",
        kpis.total,
        format_date_range(range.map(|r| r.start), range.map(|r| r.end))
    );
    println!(
        "Meaningful engagement: {} ({})",
        format_percent(kpis.meaningful_rate()),
        kpis.meaningful
    );
    println!(
        "Abandoned (<15s): {} ({})",
        format_percent(kpis.abandon_rate()),
        kpis.abandoned
    );
    println!("Avg duration: {}", format_secs_rounded(kpis.avg_duration));

    for dimension in Dimension::ALL {
        println!();
        print_buckets(dimension, overview.buckets(dimension));
    }

    if !overview.trend.is_empty() {
        println!();
        println!("Daily Volume");
        for point in &overview.trend {
            println!(
                "  {}  {:>5}  avg {}s",
                point.date, point.count, point.avg_duration
            );
        }
    }
}

fn print_buckets(dimension: Dimension, buckets: &[AggregateBucket]) {
    println!("{}", dimension.title());
    if buckets.is_empty() {
        println!("  (no data)");
        return;
    }

    println!(
        "  {:<30} {:>6} {:>8} {:>7} {:>8} {:>8} {:>20} {:>16}",
        "NAME", "COUNT", "ABANDON", "DEEP", "TOOLS", "FUNC OK", "DURATION", "TURNS"
    );
    for b in buckets {
        println!(
            "  {:<30} {:>6} {:>8} {:>7} {:>8} {:>8} {:>20} {:>16}",
            truncate(&b.label, 30),
            b.count,
            format_percent(b.abandon_rate()),
            format_percent(b.deep_rate()),
            format_percent(b.tool_use_rate()),
            format_percent_opt(b.func_success_rate()),
            b.duration_summary().to_string(),
            b.turns_summary().to_string(),
        );
    }
}

/// One line of the explorer listing.
#[derive(Debug, Serialize)]
pub struct ConversationRow<'a> {
    pub id: &'a str,
    pub agent_id: &'a str,
    pub started_at: String,
    pub context_type: &'a str,
    pub context_title: &'a str,
    pub duration_secs: u64,
    pub turns: usize,
    pub used_tools: bool,
    pub tool_failure: bool,
    pub status: &'static str,
}

impl<'a> From<&'a Conversation> for ConversationRow<'a> {
    fn from(c: &'a Conversation) -> Self {
        Self {
            id: &c.id,
            agent_id: &c.agent_id,
            started_at: c.started_at().map(|ts| ts.to_rfc3339()).unwrap_or_default(),
            context_type: c.context_type_or_default(),
            context_title: c.context_title_or_default(),
            duration_secs: c.duration_secs(),
            turns: c.turn_count(),
            used_tools: c.used_tools(),
            tool_failure: c.has_tool_failure(),
            status: if c.is_tech_failure() { "Failed" } else { "Success" },
        }
    }
}

pub fn print_conversations(view: &[&Conversation]) {
    println!(
        "{:<14} {:<32} {:<16} {:>6} {:>5}  {:<7}  {}",
        "STARTED", "CONTEXT", "TYPE", "DUR", "TURNS", "STATUS", "ID"
    );
    for c in view {
        let row = ConversationRow::from(*c);
        let started = c
            .started_at()
            .map(|ts| ts.format("%b %-d, %H:%M").to_string())
            .unwrap_or_default();

        let mut context = row.context_title.to_string();
        if row.used_tools {
            context.push_str(" [tool]");
        }
        if row.tool_failure {
            context.push_str(" [error]");
        }

        println!(
            "{:<14} {:<32} {:<16} {:>5}s {:>5}  {:<7}  {}",
            started,
            truncate(&context, 32),
            truncate(row.context_type, 16),
            row.duration_secs,
            row.turns,
            row.status,
            row.id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Mock Interview: Backend", 10), "Mock In...");
    }
}
