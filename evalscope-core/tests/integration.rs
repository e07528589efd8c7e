//! Integration tests for evalscope ingestion, analytics and reporting
//!
//! These tests load `tests/fixtures/conversations.json` (six calls across two
//! agents and three days) and drive the public API end to end.

use async_trait::async_trait;
use chrono::NaiveDate;
use evalscope_core::analytics::{Dimension, MetricColumn, Overview};
use evalscope_core::config::{AgentRegistry, ReportConfig};
use evalscope_core::filter::{explore, filter, ExplorerQuery};
use evalscope_core::report::{
    ChatMessage, PdfPayload, PipelineState, ReportBackend, ReportInput, ReportPipeline, ReportStats,
};
use evalscope_core::workbench::{enrich_items, AnalysisSession};
use evalscope_core::{
    Conversation, DateRange, FilterState, FilterType, InteractionMode, PinnedItem, Result,
    SortConfig, SortDirection, SortKey, TranscriptStore, Workbench,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

const ADVISOR: &str = "agent_advisor";

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn load_store() -> TranscriptStore {
    TranscriptStore::load_path(&fixture_path("conversations.json")).expect("fixture should load")
}

fn registry() -> AgentRegistry {
    let mut names = BTreeMap::new();
    names.insert(ADVISOR.to_string(), "Blue".to_string());
    names.insert("agent_sales".to_string(), "Sales".to_string());
    AgentRegistry {
        advisor_id: ADVISOR.to_string(),
        names,
    }
}

fn aug(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
}

fn ids(view: &[&Conversation]) -> Vec<String> {
    view.iter().map(|c| c.id.clone()).collect()
}

// ============================================
// Ingestion
// ============================================

#[test]
fn test_fixture_loads_newest_first() {
    let store = load_store();
    assert_eq!(store.len(), 6);
    assert_eq!(store.conversations()[0].id, "conv-0006");
    assert_eq!(store.conversations()[5].id, "conv-0001");

    let range = store.default_date_range().unwrap();
    assert_eq!(range, DateRange::new(aug(1), aug(3)));
}

#[test]
fn test_wire_fields_are_interpreted() {
    let store = load_store();

    let first = store.get("conv-0001").unwrap();
    assert_eq!(first.variables().user_first_name.as_deref(), Some("Dana"));
    assert_eq!(first.context_type(), Some("Interview Prep"));
    assert_eq!(first.interaction_mode(), InteractionMode::Specialized);
    assert!(first.is_deep());
    assert!(first.used_tools());
    // end_call is excluded from the tally
    assert_eq!(first.tool_result_tally(), (1, 1));
    assert_eq!(first.transcript[0].latency().first_byte, Some(0.42));

    let bare = store.get("conv-0002").unwrap();
    assert_eq!(bare.context_type(), None);
    assert_eq!(bare.context_type_or_default(), "General");
    assert_eq!(bare.interaction_mode(), InteractionMode::Standard);
    assert!(bare.is_abandoned());

    let silent = store.get("conv-0004").unwrap();
    assert!(silent.is_tech_failure());
    assert_eq!(silent.turn_count(), 0);
}

#[test]
fn test_glob_loading_merges_files() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let content = std::fs::read_to_string(fixture_path("conversations.json")).unwrap();
    let all: Vec<serde_json::Value> = serde_json::from_str(&content).unwrap();
    let (left, right) = all.split_at(2);

    std::fs::write(
        temp_dir.path().join("part-a.json"),
        serde_json::to_string(left).unwrap(),
    )
    .unwrap();
    std::fs::write(
        temp_dir.path().join("part-b.json"),
        serde_json::to_string(right).unwrap(),
    )
    .unwrap();

    let pattern = format!("{}/*.json", temp_dir.path().display());
    let store = TranscriptStore::load_globs(&[pattern]).unwrap();
    assert_eq!(store.len(), 6);
    assert_eq!(store.conversations()[0].id, "conv-0006");
}

// ============================================
// Analytics
// ============================================

#[test]
fn test_overview_over_fixture() {
    let store = load_store();
    let registry = registry();
    let overview = Overview::compute(&store.within(None), &registry);

    assert_eq!(overview.kpis.total, 6);
    assert_eq!(overview.kpis.meaningful, 2);
    assert_eq!(overview.kpis.abandoned, 2);
    assert!((overview.kpis.avg_duration - 286.0 / 6.0).abs() < 1e-9);

    let agents = overview.buckets(Dimension::Agent);
    assert_eq!(agents.len(), 2);
    assert_eq!(agents[0].key, ADVISOR);
    assert_eq!(agents[0].label, "Blue");
    assert_eq!(agents[0].count, 4);
    assert_eq!(agents[0].tool_use_count, 2);
    assert_eq!(agents[0].func_success_rate(), Some(0.5));
    assert_eq!(agents[1].func_success_rate(), None);

    // Advisor-only views ignore the sales agent.
    let mode_total: usize = overview.modes.iter().map(|b| b.count).sum();
    assert_eq!(mode_total, 4);

    let types = overview.buckets(Dimension::ContextType);
    assert_eq!(types[0].key, "Interview Prep");
    assert_eq!(types[0].count, 2);
    assert!(types.iter().any(|b| b.key == "General" && b.count == 1));

    let prompts = overview.buckets(Dimension::PromptTitle);
    assert_eq!(prompts[0].key, "Mock Interview: Backend");
    assert!(prompts.iter().any(|b| b.key == "Unknown"));

    let trend: Vec<_> = overview
        .trend
        .iter()
        .map(|p| (p.date.as_str(), p.count, p.avg_duration))
        .collect();
    assert_eq!(
        trend,
        vec![("Aug 01", 2, 64), ("Aug 02", 2, 24), ("Aug 03", 2, 55)]
    );
}

#[test]
fn test_drill_down_reproduces_bucket_population() {
    let store = load_store();
    let registry = registry();
    let overview = Overview::compute(&store.within(None), &registry);

    for bucket in overview.agents.iter().chain(&overview.modes) {
        let matched = filter(store.conversations(), &bucket.drill_down(MetricColumn::Count), None);
        assert_eq!(matched.len(), bucket.count, "bucket {}", bucket.key);
    }

    for bucket in &overview.agents {
        let short = filter(
            store.conversations(),
            &bucket.drill_down(MetricColumn::AbandonRate),
            None,
        );
        assert_eq!(short.len(), bucket.abandoned_count, "bucket {}", bucket.key);
    }

    // An explicit category drops the mode predicate, so a mode drill-down
    // widens to every matching advisor call.
    let standard = overview
        .modes
        .iter()
        .find(|b| b.key == "Standard")
        .unwrap();
    assert_eq!(standard.abandoned_count, 1);
    let short = filter(
        store.conversations(),
        &standard.drill_down(MetricColumn::AbandonRate),
        None,
    );
    assert_eq!(ids(&short), vec!["conv-0004", "conv-0002"]);

    // Workbench samples for the same cell stay inside the mode.
    let cell = PinnedItem::bucket_cell(standard, MetricColumn::AbandonRate);
    let enriched = enrich_items(&[cell], &store);
    let sampled: Vec<_> = enriched[0]["data"]["sampleConversations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["conversation_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(sampled, vec!["conv-0002"]);
}

// ============================================
// Explorer
// ============================================

#[test]
fn test_explorer_queries() {
    let store = load_store();

    let failures = explore(
        &store,
        &ExplorerQuery {
            filter: FilterState::agent(ADVISOR).with_filter_type(FilterType::ToolFailure),
            ..Default::default()
        },
    );
    assert_eq!(ids(&failures), vec!["conv-0003"]);

    let searched = explore(
        &store,
        &ExplorerQuery {
            search: "mock".to_string(),
            sort: SortConfig::new(SortKey::Duration, SortDirection::Asc),
            ..Default::default()
        },
    );
    assert_eq!(ids(&searched), vec!["conv-0004", "conv-0001"]);

    let one_day = explore(
        &store,
        &ExplorerQuery {
            filter: FilterState {
                date: Some("Aug 02".to_string()),
                ..Default::default()
            },
            // The legacy label wins over the global range.
            date_range: Some(DateRange::new(aug(3), aug(3))),
            ..Default::default()
        },
    );
    assert_eq!(ids(&one_day), vec!["conv-0004", "conv-0003"]);

    let global_only = explore(
        &store,
        &ExplorerQuery {
            date_range: Some(DateRange::new(aug(3), aug(3))),
            ..Default::default()
        },
    );
    assert_eq!(ids(&global_only), vec!["conv-0006", "conv-0005"]);
}

// ============================================
// Backend double
// ============================================

#[derive(Default)]
struct RecordingBackend {
    chunks: Mutex<Vec<usize>>,
    summaries: Mutex<Vec<String>>,
    stats: Mutex<Option<ReportStats>>,
    payload: Mutex<Option<PdfPayload>>,
    context_items: Mutex<Vec<serde_json::Value>>,
}

#[async_trait]
impl ReportBackend for RecordingBackend {
    async fn batch_analyze(&self, conversations: &[&Conversation]) -> Result<String> {
        let mut chunks = self.chunks.lock().unwrap();
        chunks.push(conversations.len());
        Ok(format!("summary {}", chunks.len()))
    }

    async fn final_report(&self, summaries: &[String], stats: &ReportStats) -> Result<String> {
        *self.summaries.lock().unwrap() = summaries.to_vec();
        *self.stats.lock().unwrap() = Some(stats.clone());
        Ok("<h1>Report</h1>".to_string())
    }

    async fn render_pdf(&self, payload: &PdfPayload) -> Result<Vec<u8>> {
        *self.payload.lock().unwrap() = Some(payload.clone());
        Ok(b"%PDF-1.7".to_vec())
    }

    async fn analyze(
        &self,
        messages: &[ChatMessage],
        context_items: &[serde_json::Value],
    ) -> Result<String> {
        *self.context_items.lock().unwrap() = context_items.to_vec();
        Ok(format!("{} message(s) considered", messages.len()))
    }
}

// ============================================
// Report pipeline
// ============================================

#[tokio::test]
async fn test_report_run_over_fixture() {
    let store = load_store();
    let registry = registry();
    let range = store.default_date_range();

    let backend = Arc::new(RecordingBackend::default());
    let config = ReportConfig {
        chunk_size: 4,
        reset_delay_ms: 200,
        ..ReportConfig::default()
    };
    let pipeline = ReportPipeline::new(backend.clone(), config);

    let output = pipeline
        .run(ReportInput {
            conversations: store.within(range.as_ref()),
            date_range: range,
            registry: &registry,
        })
        .await
        .expect("report should succeed");

    assert_eq!(output.document, b"%PDF-1.7");
    assert_eq!(output.html, "<h1>Report</h1>");
    assert_eq!(output.chunks_total, 2);
    assert_eq!(output.chunks_failed, 0);
    assert_eq!(pipeline.state(), PipelineState::Success);

    assert_eq!(*backend.chunks.lock().unwrap(), vec![4, 2]);
    assert_eq!(
        *backend.summaries.lock().unwrap(),
        vec!["summary 1".to_string(), "summary 2".to_string()]
    );

    let stats = backend.stats.lock().unwrap().clone().unwrap();
    assert_eq!(stats.kpis.total, 6);
    assert_eq!(stats.agent_stats.len(), 2);

    let payload = backend.payload.lock().unwrap().clone().unwrap();
    assert_eq!(payload.date_range, "Aug 1 - Aug 3");
    assert_eq!(payload.kpis.total_conversations, 6);
    assert_eq!(payload.kpis.avg_duration, "48s");
    assert_eq!(payload.kpis.meaningful_engagement, "33.3%");
    assert_eq!(payload.kpis.tech_failure_rate, "33.3%");
    assert_eq!(payload.agent_stats[0].name, "Blue");
    assert_eq!(payload.agent_stats[0].func_success, "50.0%");
    assert_eq!(payload.agent_stats[1].func_success, "N/A");
    assert_eq!(payload.strategy_stats[0].context_type, "Interview Prep");
    assert_eq!(payload.analysis_html, "<h1>Report</h1>");

    let mut states = pipeline.subscribe();
    tokio::time::timeout(
        std::time::Duration::from_secs(2),
        states.wait_for(PipelineState::is_idle),
    )
    .await
    .expect("pipeline should reset")
    .unwrap();
}

// ============================================
// Workbench
// ============================================

#[tokio::test]
async fn test_workbench_chat_sends_live_samples() {
    let store = load_store();
    let registry = registry();
    let overview = Overview::compute(&store.within(None), &registry);

    let mut workbench = Workbench::new();
    let interview = overview
        .context_types
        .iter()
        .find(|b| b.key == "Interview Prep")
        .unwrap();
    workbench.add(PinnedItem::stat_row(interview));
    workbench.add(PinnedItem::conversation(store.get("conv-0005").unwrap()));
    assert_eq!(workbench.len(), 2);

    let items = enrich_items(workbench.items(), &store);
    let samples: Vec<_> = items[0]["data"]["sampleConversations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["conversation_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(samples, vec!["conv-0001", "conv-0004"]);
    assert!(items[1]["data"].get("sampleConversations").is_none());

    let backend = RecordingBackend::default();
    let mut session = AnalysisSession::new();
    let reply = session
        .send("Why do interview calls fail?", &workbench, &store, &backend)
        .await
        .unwrap();
    assert_eq!(reply, "1 message(s) considered");
    assert_eq!(backend.context_items.lock().unwrap().len(), 2);
}
