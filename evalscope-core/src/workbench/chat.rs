//! Analysis chat over the pinned workbench items.

use crate::error::{Error, Result};
use crate::report::{ChatMessage, ChatRole, ReportBackend};
use crate::store::TranscriptStore;

use super::{enrich_items, Workbench};

/// Reply recorded when the analysis endpoint fails.
pub const ANALYSIS_ERROR_REPLY: &str = "Sorry, I encountered an error analyzing the data.";

/// Conversation history with the analysis endpoint.
#[derive(Debug, Clone, Default)]
pub struct AnalysisSession {
    messages: Vec<ChatMessage>,
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Ask a question about the pinned items.
    ///
    /// Rejects blank input and an empty workbench without touching the history.
    pub async fn send(
        &mut self,
        text: &str,
        workbench: &Workbench,
        store: &TranscriptStore,
        backend: &dyn ReportBackend,
    ) -> Result<String> {
        if text.trim().is_empty() {
            return Err(Error::Workbench("message is empty".to_string()));
        }
        if workbench.is_empty() {
            return Err(Error::Workbench("no items pinned".to_string()));
        }

        self.messages.push(ChatMessage::user(text));
        self.ask(workbench, store, backend).await
    }

    /// Drop the last assistant reply and ask again.
    pub async fn regenerate(
        &mut self,
        workbench: &Workbench,
        store: &TranscriptStore,
        backend: &dyn ReportBackend,
    ) -> Result<String> {
        match self.messages.last() {
            Some(last) if last.role == ChatRole::Assistant => {
                self.messages.pop();
            }
            _ => return Err(Error::Workbench("nothing to regenerate".to_string())),
        }
        self.ask(workbench, store, backend).await
    }

    /// Forget the whole history.
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    /// Remove one message by position.
    pub fn delete(&mut self, index: usize) -> Option<ChatMessage> {
        (index < self.messages.len()).then(|| self.messages.remove(index))
    }

    async fn ask(
        &mut self,
        workbench: &Workbench,
        store: &TranscriptStore,
        backend: &dyn ReportBackend,
    ) -> Result<String> {
        let context_items = enrich_items(workbench.items(), store);

        match backend.analyze(&self.messages, &context_items).await {
            Ok(reply) => {
                self.messages.push(ChatMessage::assistant(reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                tracing::warn!(error = %e, items = context_items.len(), "Analysis query failed");
                self.messages.push(ChatMessage::assistant(ANALYSIS_ERROR_REPLY));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterState;
    use crate::report::{PdfPayload, ReportStats, Stage};
    use crate::types::test_support::conversation;
    use crate::types::Conversation;
    use crate::workbench::PinnedItem;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct EchoBackend {
        fail: AtomicBool,
        last_request: Mutex<Option<(Vec<ChatMessage>, Vec<serde_json::Value>)>>,
    }

    #[async_trait]
    impl ReportBackend for EchoBackend {
        async fn batch_analyze(&self, _: &[&Conversation]) -> Result<String> {
            unreachable!()
        }

        async fn final_report(&self, _: &[String], _: &ReportStats) -> Result<String> {
            unreachable!()
        }

        async fn render_pdf(&self, _: &PdfPayload) -> Result<Vec<u8>> {
            unreachable!()
        }

        async fn analyze(
            &self,
            messages: &[ChatMessage],
            context_items: &[serde_json::Value],
        ) -> Result<String> {
            *self.last_request.lock().unwrap() = Some((messages.to_vec(), context_items.to_vec()));
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Remote {
                    stage: Stage::Analyze,
                    message: "API error (500 Internal Server Error): down".to_string(),
                });
            }
            Ok(format!("answer #{}", messages.len()))
        }
    }

    fn setup() -> (Workbench, TranscriptStore) {
        let store = TranscriptStore::new(vec![
            conversation("a", "blue", 100, 2),
            conversation("b", "blue", 50, 2),
        ]);
        let mut wb = Workbench::new();
        wb.add(PinnedItem::slice("Blue", "Count", 2.into(), FilterState::agent("blue")));
        (wb, store)
    }

    #[tokio::test]
    async fn test_send_includes_enriched_items() {
        let (wb, store) = setup();
        let backend = EchoBackend::default();
        let mut session = AnalysisSession::new();

        let reply = session.send("why so short?", &wb, &store, &backend).await.unwrap();
        assert_eq!(reply, "answer #1");
        assert_eq!(session.messages().len(), 2);

        let (messages, items) = backend.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(messages, vec![ChatMessage::user("why so short?")]);
        let samples = items[0]["data"]["sampleConversations"].as_array().unwrap();
        assert_eq!(samples.len(), 2);
    }

    #[tokio::test]
    async fn test_send_rejects_blank_input_and_empty_workbench() {
        let (wb, store) = setup();
        let backend = EchoBackend::default();
        let mut session = AnalysisSession::new();

        assert!(session.send("   ", &wb, &store, &backend).await.is_err());
        assert!(session
            .send("hello", &Workbench::new(), &store, &backend)
            .await
            .is_err());
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_failure_appends_fallback_reply() {
        let (wb, store) = setup();
        let backend = EchoBackend::default();
        backend.fail.store(true, Ordering::SeqCst);
        let mut session = AnalysisSession::new();

        assert!(session.send("hi", &wb, &store, &backend).await.is_err());
        assert_eq!(session.messages()[1], ChatMessage::assistant(ANALYSIS_ERROR_REPLY));
    }

    #[tokio::test]
    async fn test_regenerate_replaces_last_reply() {
        let (wb, store) = setup();
        let backend = EchoBackend::default();
        let mut session = AnalysisSession::new();

        assert!(session.regenerate(&wb, &store, &backend).await.is_err());

        session.send("first", &wb, &store, &backend).await.unwrap();
        let reply = session.regenerate(&wb, &store, &backend).await.unwrap();
        // Only the user message was sent the second time.
        assert_eq!(reply, "answer #1");
        assert_eq!(session.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_and_reset() {
        let (wb, store) = setup();
        let backend = EchoBackend::default();
        let mut session = AnalysisSession::new();
        session.send("first", &wb, &store, &backend).await.unwrap();

        assert_eq!(session.delete(0), Some(ChatMessage::user("first")));
        assert_eq!(session.delete(5), None);
        assert_eq!(session.messages().len(), 1);

        session.reset();
        assert!(session.messages().is_empty());
    }
}
