//! Request and response bodies for the remote report endpoints.

use crate::analytics::{aggregate, AggregateBucket, Dimension, Kpis};
use crate::config::AgentRegistry;
use crate::format::{format_percent, format_percent_opt, format_secs, format_secs_rounded};
use crate::types::Conversation;
use serde::{Deserialize, Serialize};

/// Aggregate statistics handed to the reduce stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStats {
    pub kpis: Kpis,
    pub agent_stats: Vec<AggregateBucket>,
    /// Context-type buckets
    pub type_stats: Vec<AggregateBucket>,
}

impl ReportStats {
    /// KPIs, agent buckets and context-type buckets for the report input.
    pub fn compute(conversations: &[&Conversation], registry: &AgentRegistry) -> Self {
        let view = || conversations.iter().copied();
        Self {
            kpis: Kpis::compute(view()),
            agent_stats: aggregate(view(), Dimension::Agent, registry),
            type_stats: aggregate(view(), Dimension::ContextType, registry),
        }
    }
}

/// POST `api/evals/batch-analyze`
#[derive(Debug, Serialize)]
pub struct BatchAnalyzeRequest<'a> {
    pub conversations: &'a [&'a Conversation],
}

#[derive(Debug, Deserialize)]
pub struct BatchAnalyzeResponse {
    pub analysis: String,
}

/// POST `api/evals/final-report`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalReportRequest<'a> {
    pub batch_summaries: &'a [String],
    pub stats: &'a ReportStats,
}

#[derive(Debug, Deserialize)]
pub struct FinalReportResponse {
    pub html: String,
}

/// Headline block of the rendered document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfKpis {
    pub total_conversations: usize,
    pub avg_duration: String,
    pub meaningful_engagement: String,
    pub tech_failure_rate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfAgentRow {
    pub name: String,
    pub total: usize,
    pub abandon_rate: String,
    pub deep_rate: String,
    pub tool_use: String,
    pub func_success: String,
    pub duration: String,
    pub turns: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfStrategyRow {
    #[serde(rename = "type")]
    pub context_type: String,
    pub count: usize,
    pub avg_duration: String,
    pub abandon_rate: String,
    pub deep_rate: String,
}

/// POST `api/evals/pdf`, answered with the binary document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfPayload {
    pub date_range: String,
    pub kpis: PdfKpis,
    pub agent_stats: Vec<PdfAgentRow>,
    pub strategy_stats: Vec<PdfStrategyRow>,
    pub analysis_html: String,
}

impl PdfKpis {
    /// The "tech failure" headline is the abandonment share.
    pub fn from_kpis(kpis: &Kpis) -> Self {
        Self {
            total_conversations: kpis.total,
            avg_duration: format_secs_rounded(kpis.avg_duration),
            meaningful_engagement: format_percent(kpis.meaningful_rate()),
            tech_failure_rate: format_percent(kpis.abandon_rate()),
        }
    }
}

impl From<&AggregateBucket> for PdfAgentRow {
    fn from(b: &AggregateBucket) -> Self {
        Self {
            name: b.label.clone(),
            total: b.count,
            abandon_rate: format_percent(b.abandon_rate()),
            deep_rate: format_percent(b.deep_rate()),
            tool_use: format_percent(b.tool_use_rate()),
            func_success: format_percent_opt(b.func_success_rate()),
            duration: b.duration_summary().to_string(),
            turns: b.turns_summary().to_string(),
        }
    }
}

impl From<&AggregateBucket> for PdfStrategyRow {
    fn from(b: &AggregateBucket) -> Self {
        Self {
            context_type: b.key.clone(),
            count: b.count,
            avg_duration: format_secs(b.duration_summary().avg),
            abandon_rate: format_percent(b.abandon_rate()),
            deep_rate: format_percent(b.deep_rate()),
        }
    }
}

impl PdfPayload {
    /// Flatten stats into the display strings the renderer expects.
    pub fn build(date_range: &str, stats: &ReportStats, analysis_html: String) -> Self {
        Self {
            date_range: date_range.to_string(),
            kpis: PdfKpis::from_kpis(&stats.kpis),
            agent_stats: stats.agent_stats.iter().map(PdfAgentRow::from).collect(),
            strategy_stats: stats.type_stats.iter().map(PdfStrategyRow::from).collect(),
            analysis_html,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of the workbench analysis chat as sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// POST `api/evals/analyze`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest<'a> {
    pub messages: &'a [ChatMessage],
    pub context_items: &'a [serde_json::Value],
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeResponse {
    pub response: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::*;

    fn stats() -> ReportStats {
        let registry = AgentRegistry::default();
        let advisor = registry.advisor_id.clone();
        let mut tooled = with_context(conversation("t", &advisor, 90, 5), "Drill", "Edges");
        tooled.transcript[0].tool_calls = Some(vec![tool_call("lookup")]);
        tooled.transcript[0].tool_results = Some(vec![tool_result("lookup", false)]);
        let convs = vec![conversation("a", &advisor, 10, 1), tooled];

        let view: Vec<&Conversation> = convs.iter().collect();
        ReportStats::compute(&view, &registry)
    }

    #[test]
    fn test_pdf_payload_formatting() {
        let payload = PdfPayload::build("Aug 1 - Aug 2", &stats(), "<p>ok</p>".to_string());

        assert_eq!(payload.kpis.total_conversations, 2);
        assert_eq!(payload.kpis.avg_duration, "50s");
        assert_eq!(payload.kpis.meaningful_engagement, "50.0%");
        assert_eq!(payload.kpis.tech_failure_rate, "50.0%");

        let agent = &payload.agent_stats[0];
        assert_eq!(agent.total, 2);
        assert_eq!(agent.func_success, "100.0%");
        assert_eq!(agent.duration, "10 / 50.0 / 90");
        assert_eq!(agent.turns, "2 / 6.0 / 10");

        let drill = payload
            .strategy_stats
            .iter()
            .find(|s| s.context_type == "Drill")
            .unwrap();
        assert_eq!(drill.avg_duration, "90.0s");
        assert_eq!(drill.deep_rate, "100.0%");
    }

    #[test]
    fn test_unregistered_agents_have_no_pdf_row() {
        let registry = AgentRegistry::default();
        let convs = vec![
            conversation("a", &registry.advisor_id, 10, 1),
            conversation("b", "stranger", 20, 1),
        ];
        let view: Vec<&Conversation> = convs.iter().collect();
        let stats = ReportStats::compute(&view, &registry);
        assert_eq!(stats.kpis.total, 2);

        let payload = PdfPayload::build("All Time", &stats, String::new());
        assert_eq!(payload.agent_stats.len(), 1);
        assert_eq!(payload.agent_stats[0].name, "Blue");
    }

    #[test]
    fn test_pdf_payload_wire_names() {
        let payload = PdfPayload::build("All Time", &stats(), String::new());
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value["kpis"]["totalConversations"].is_number());
        assert!(value["agentStats"][0]["funcSuccess"].is_string());
        assert!(value["strategyStats"][0]["type"].is_string());
        assert_eq!(value["dateRange"], "All Time");
        assert!(value.get("analysisHtml").is_some());
    }

    #[test]
    fn test_empty_stats_have_no_nan() {
        let payload = PdfPayload::build("All Time", &ReportStats::default(), String::new());
        assert_eq!(payload.kpis.meaningful_engagement, "0.0%");
        assert_eq!(payload.kpis.avg_duration, "0s");
    }
}
