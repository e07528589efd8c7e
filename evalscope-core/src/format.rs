//! Formatting helpers shared by table output and the report payload.

use chrono::NaiveDate;

/// Format a ratio in `[0, 1]` as a one-decimal percentage (e.g., "12.5%").
pub fn format_percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Format an optional ratio, or "N/A" when undefined.
pub fn format_percent_opt(ratio: Option<f64>) -> String {
    match ratio {
        Some(r) => format_percent(r),
        None => "N/A".to_string(),
    }
}

/// `part / whole`, or 0 when `whole` is 0.
pub fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Whole seconds, rounded (e.g., "43s").
pub fn format_secs_rounded(secs: f64) -> String {
    format!("{}s", secs.round() as i64)
}

/// Seconds with one decimal (e.g., "42.7s").
pub fn format_secs(secs: f64) -> String {
    format!("{:.1}s", secs)
}

/// Label for the report's date range: "Aug 1 - Aug 31", or "All Time".
pub fn format_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> String {
    match (start, end) {
        (Some(start), Some(end)) => {
            format!("{} - {}", start.format("%b %-d"), end.format("%b %-d"))
        }
        _ => "All Time".to_string(),
    }
}
