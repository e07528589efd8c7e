//! Core domain types for evalscope
//!
//! These types mirror the transcript export produced by the voice-agent
//! platform: one [`Conversation`] per recorded call, each holding the ordered
//! dialogue [`Message`]s plus timing metadata and the dynamic variables the
//! call was started with.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Abandonment** | A call shorter than [`ABANDON_BELOW_SECS`] seconds |
//! | **Deep engagement** | A call longer than [`DEEP_ABOVE_SECS`] seconds with at least [`DEEP_MIN_USER_TURNS`] user turns |
//! | **Tech failure** | A call that connected but has no transcript at all |
//! | **Tool call** | A function invocation issued by the agent; [`END_CALL_TOOL`] is never counted |
//! | **Interaction mode** | `Standard` for the agent's base persona, `Specialized` for context-driven sessions |
//!
//! The wire format is snake_case JSON; field names on the Rust side follow the
//! concepts, with `serde` renames where the export uses different names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel tool the agent uses to hang up. Excluded from tool accounting.
pub const END_CALL_TOOL: &str = "end_call";

/// Calls strictly shorter than this are abandoned.
pub const ABANDON_BELOW_SECS: u64 = 15;

/// Calls strictly longer than this may count as deep engagement.
pub const DEEP_ABOVE_SECS: u64 = 60;

/// Minimum user-authored turns for deep engagement.
pub const DEEP_MIN_USER_TURNS: usize = 5;

/// Context type assumed when a call carries none.
pub const DEFAULT_CONTEXT_TYPE: &str = "General";

/// Context title assumed when a call carries none.
pub const DEFAULT_CONTEXT_TITLE: &str = "Unknown";

// ============================================
// Messages
// ============================================

/// Who authored a dialogue turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
        }
    }
}

/// A tool invocation issued during a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    /// Remaining provider fields (parameters, request ids, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Outcome of a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ToolCall {
    /// True unless this is the hang-up sentinel.
    pub fn counts(&self) -> bool {
        self.tool_name != END_CALL_TOOL
    }
}

impl ToolResult {
    /// True unless this is the hang-up sentinel.
    pub fn counts(&self) -> bool {
        self.tool_name != END_CALL_TOOL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElapsedTime {
    pub elapsed_time: f64,
}

/// Raw per-turn service timings as exported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convai_llm_service_ttfb: Option<ElapsedTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convai_tts_service_ttfb: Option<ElapsedTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convai_llm_service_tt_last_sentence: Option<ElapsedTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ServiceMetrics>,
}

/// Latency figures for one agent turn, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TurnLatency {
    /// Time to first LLM byte
    pub first_byte: Option<f64>,
    /// Time to first synthesized audio byte
    pub synthesis: Option<f64>,
    /// Time until the last sentence was generated
    pub total_generation: Option<f64>,
}

impl TurnLatency {
    pub fn is_empty(&self) -> bool {
        self.first_byte.is_none() && self.synthesis.is_none() && self.total_generation.is_none()
    }
}

/// One dialogue turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    /// Spoken or typed text (may be null in exports for tool-only turns)
    #[serde(rename = "message", default)]
    pub text: Option<String>,
    /// Seconds since the call started
    #[serde(rename = "time_in_call_secs", default)]
    pub offset_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<ToolResult>>,
    #[serde(
        rename = "conversation_turn_metrics",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub turn_metrics: Option<TurnMetrics>,
}

impl Message {
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }

    pub fn tool_results(&self) -> &[ToolResult] {
        self.tool_results.as_deref().unwrap_or(&[])
    }

    /// Latency figures for this turn, if the export carried any.
    pub fn latency(&self) -> TurnLatency {
        let Some(metrics) = self.turn_metrics.as_ref().and_then(|m| m.metrics.as_ref()) else {
            return TurnLatency::default();
        };
        TurnLatency {
            first_byte: metrics.convai_llm_service_ttfb.map(|t| t.elapsed_time),
            synthesis: metrics.convai_tts_service_ttfb.map(|t| t.elapsed_time),
            total_generation: metrics
                .convai_llm_service_tt_last_sentence
                .map(|t| t.elapsed_time),
        }
    }
}

// ============================================
// Conversations
// ============================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallMetadata {
    pub start_time_unix_secs: i64,
    #[serde(default)]
    pub call_duration_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_reason: Option<String>,
}

/// Variables injected when the call was started.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicVariables {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_type: Option<String>,
    #[serde(rename = "user_firstname", default, skip_serializing_if = "Option::is_none")]
    pub user_first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitiationContext {
    #[serde(default)]
    pub dynamic_variables: DynamicVariables,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(rename = "conversation_id")]
    pub id: String,
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub transcript: Vec<Message>,
    pub metadata: CallMetadata,
    #[serde(rename = "conversation_initiation_client_data", default)]
    pub initiation: InitiationContext,
}

impl Conversation {
    pub fn variables(&self) -> &DynamicVariables {
        &self.initiation.dynamic_variables
    }

    /// Context type as recorded, without defaulting.
    pub fn context_type(&self) -> Option<&str> {
        self.variables().context_type.as_deref()
    }

    /// Context type, defaulting to [`DEFAULT_CONTEXT_TYPE`].
    pub fn context_type_or_default(&self) -> &str {
        self.context_type().unwrap_or(DEFAULT_CONTEXT_TYPE)
    }

    pub fn context_title(&self) -> Option<&str> {
        self.variables().context_title.as_deref()
    }

    /// Context title, defaulting to [`DEFAULT_CONTEXT_TITLE`].
    pub fn context_title_or_default(&self) -> &str {
        self.context_title().unwrap_or(DEFAULT_CONTEXT_TITLE)
    }

    pub fn duration_secs(&self) -> u64 {
        self.metadata.call_duration_secs
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.metadata.start_time_unix_secs, 0)
    }

    /// Day label (`Aug 01`) used by the trend series and the legacy date filter.
    pub fn day_label(&self) -> String {
        self.started_at()
            .map(|ts| ts.format("%b %d").to_string())
            .unwrap_or_default()
    }

    /// Number of turns in the transcript.
    pub fn turn_count(&self) -> usize {
        self.transcript.len()
    }

    /// Number of user-authored turns.
    pub fn user_turns(&self) -> usize {
        self.transcript
            .iter()
            .filter(|m| m.role == Role::User)
            .count()
    }

    /// Connected but nothing was said.
    pub fn is_tech_failure(&self) -> bool {
        self.transcript.is_empty()
    }

    pub fn is_abandoned(&self) -> bool {
        self.duration_secs() < ABANDON_BELOW_SECS
    }

    /// Long and substantively multi-turn.
    pub fn is_deep(&self) -> bool {
        self.duration_secs() > DEEP_ABOVE_SECS && self.user_turns() >= DEEP_MIN_USER_TURNS
    }

    /// At least one real (non hang-up) tool call.
    pub fn used_tools(&self) -> bool {
        self.transcript
            .iter()
            .any(|m| m.tool_calls().iter().any(ToolCall::counts))
    }

    /// At least one real tool result flagged as an error.
    pub fn has_tool_failure(&self) -> bool {
        self.transcript
            .iter()
            .any(|m| m.tool_results().iter().any(|r| r.counts() && r.is_error))
    }

    /// `(total, successful)` tool results, excluding the hang-up sentinel.
    pub fn tool_result_tally(&self) -> (u64, u64) {
        self.transcript
            .iter()
            .flat_map(|m| m.tool_results())
            .filter(|r| r.counts())
            .fold((0, 0), |(total, ok), r| {
                (total + 1, if r.is_error { ok } else { ok + 1 })
            })
    }

    pub fn interaction_mode(&self) -> InteractionMode {
        InteractionMode::of(self.context_type_or_default())
    }
}

// ============================================
// Interaction mode
// ============================================

/// Whether a session ran on the base persona or a specialized context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InteractionMode {
    Standard,
    Specialized,
}

impl InteractionMode {
    pub const ALL: [InteractionMode; 2] = [InteractionMode::Standard, InteractionMode::Specialized];

    /// Classify a context type.
    pub fn of(context_type: &str) -> Self {
        match context_type {
            "SystemPrompt" | "General" | "Unknown" => InteractionMode::Standard,
            _ => InteractionMode::Specialized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionMode::Standard => "Standard",
            InteractionMode::Specialized => "Specialized",
        }
    }

    /// Row label in the mode breakdown.
    pub fn display_name(&self) -> &'static str {
        match self {
            InteractionMode::Standard => "Standard Persona",
            InteractionMode::Specialized => "Specialized Contexts",
        }
    }
}

impl std::fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for InteractionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Standard" | "standard" => Ok(InteractionMode::Standard),
            "Specialized" | "specialized" => Ok(InteractionMode::Specialized),
            _ => Err(format!("unknown interaction mode: {}", s)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_parse_export_record() {
        let json = r#"{
            "conversation_id": "conv_01",
            "agent_id": "agent_blue",
            "status": "done",
            "transcript": [
                {"role": "agent", "message": "Hi!", "time_in_call_secs": 0,
                 "conversation_turn_metrics": {"metrics": {
                    "convai_llm_service_ttfb": {"elapsed_time": 0.42},
                    "convai_tts_service_ttfb": {"elapsed_time": 0.18}}}},
                {"role": "user", "message": null, "time_in_call_secs": 3,
                 "tool_calls": [{"tool_name": "lookup_player", "params_as_json": "{}"}],
                 "tool_results": [{"tool_name": "lookup_player", "is_error": true, "result_value": "boom"}]}
            ],
            "metadata": {"start_time_unix_secs": 1754006400, "call_duration_secs": 42},
            "conversation_initiation_client_data": {
                "dynamic_variables": {"context_type": "Drill", "context_title": "Skating", "greeting": "Hey"}
            }
        }"#;

        let c: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(c.id, "conv_01");
        assert_eq!(c.turn_count(), 2);
        assert_eq!(c.user_turns(), 1);
        assert_eq!(c.context_type(), Some("Drill"));
        assert_eq!(c.interaction_mode(), InteractionMode::Specialized);
        assert_eq!(c.day_label(), "Aug 01");
        assert!(c.used_tools());
        assert!(c.has_tool_failure());
        assert_eq!(c.tool_result_tally(), (1, 0));

        let latency = c.transcript[0].latency();
        assert_eq!(latency.first_byte, Some(0.42));
        assert_eq!(latency.synthesis, Some(0.18));
        assert_eq!(latency.total_generation, None);
        assert!(c.transcript[1].latency().is_empty());

        // Provider fields survive a round trip into the batch request body.
        let value = serde_json::to_value(&c).unwrap();
        assert_eq!(
            value["transcript"][1]["tool_calls"][0]["params_as_json"],
            "{}"
        );
        assert_eq!(
            value["conversation_initiation_client_data"]["dynamic_variables"]["greeting"],
            "Hey"
        );
    }

    #[test]
    fn test_missing_context_defaults_to_standard() {
        let c = conversation("c", "a", 10, 0);
        assert_eq!(c.context_type_or_default(), "General");
        assert_eq!(c.context_title_or_default(), "Unknown");
        assert_eq!(c.interaction_mode(), InteractionMode::Standard);
    }

    #[test]
    fn test_interaction_mode_classification() {
        assert_eq!(InteractionMode::of("SystemPrompt"), InteractionMode::Standard);
        assert_eq!(InteractionMode::of("General"), InteractionMode::Standard);
        assert_eq!(InteractionMode::of("Unknown"), InteractionMode::Standard);
        assert_eq!(InteractionMode::of("GameRecap"), InteractionMode::Specialized);
    }

    #[test]
    fn test_empty_transcript_is_tech_failure_regardless_of_duration() {
        let c = conversation("c", "a", 300, 0);
        assert!(c.is_tech_failure());
        assert!(!c.is_abandoned());
    }

    #[test]
    fn test_deep_engagement_needs_five_user_turns() {
        assert!(!conversation("c", "a", 61, 4).is_deep());
        assert!(conversation("c", "a", 61, 5).is_deep());
        assert!(!conversation("c", "a", 60, 5).is_deep());
    }

    #[test]
    fn test_end_call_is_not_tool_use() {
        let mut c = conversation("c", "a", 30, 1);
        c.transcript[0].tool_calls = Some(vec![tool_call(END_CALL_TOOL)]);
        c.transcript[0].tool_results = Some(vec![tool_result(END_CALL_TOOL, true)]);
        assert!(!c.used_tools());
        assert!(!c.has_tool_failure());
        assert_eq!(c.tool_result_tally(), (0, 0));

        c.transcript[1].tool_results =
            Some(vec![tool_result("book", false), tool_result("book", true)]);
        assert_eq!(c.tool_result_tally(), (2, 1));
    }
}
