//! In-memory transcript store
//!
//! The store is the ingestion boundary: it parses transcript exports (JSON
//! arrays of [`Conversation`] records), keeps them sorted newest first, and
//! hands out borrowed views to the filter, aggregation and report layers.
//! Loading is a full replacement; the core never mutates a record.

use crate::error::{Error, Result};
use crate::filter::DateRange;
use crate::types::Conversation;
use std::path::{Path, PathBuf};

/// Immutable-per-load collection of conversations.
#[derive(Debug, Clone, Default)]
pub struct TranscriptStore {
    conversations: Vec<Conversation>,
}

impl TranscriptStore {
    /// Build a store from already-parsed records.
    pub fn new(mut conversations: Vec<Conversation>) -> Self {
        sort_newest_first(&mut conversations);
        Self { conversations }
    }

    /// Parse a JSON array of conversation records.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let conversations = parse_export(json, "<string>")?;
        Ok(Self::new(conversations))
    }

    /// Load a single export file.
    pub fn load_path(path: &Path) -> Result<Self> {
        Ok(Self::new(read_export(path)?))
    }

    /// Load every file matched by the given glob patterns.
    ///
    /// Records from all files are merged. A pattern that matches nothing is
    /// logged and skipped; an unreadable or malformed file is an error.
    pub fn load_globs<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut paths: Vec<PathBuf> = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            let entries = glob::glob(pattern).map_err(|e| Error::Load {
                source_name: pattern.to_string(),
                message: format!("Invalid glob pattern: {}", e),
            })?;

            let before = paths.len();
            paths.extend(entries.flatten().filter(|p| p.is_file()));
            if paths.len() == before {
                tracing::warn!(pattern = %pattern, "Pattern matched no files");
            }
        }

        paths.sort();
        paths.dedup();

        let mut conversations = Vec::new();
        for path in &paths {
            let batch = read_export(path)?;
            tracing::debug!(path = %path.display(), count = batch.len(), "Loaded export file");
            conversations.extend(batch);
        }

        tracing::info!(
            files = paths.len(),
            conversations = conversations.len(),
            "Transcript store loaded"
        );

        Ok(Self::new(conversations))
    }

    /// Replace the whole collection.
    pub fn replace(&mut self, conversations: Vec<Conversation>) {
        *self = Self::new(conversations);
    }

    /// All conversations, newest first.
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Look up a conversation by id.
    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Day range spanning every loaded conversation (oldest day to newest day).
    pub fn default_date_range(&self) -> Option<DateRange> {
        let newest = self.conversations.first()?.started_at()?;
        let oldest = self.conversations.last()?.started_at()?;
        Some(DateRange::new(oldest.date_naive(), newest.date_naive()))
    }

    /// Conversations inside `range` (all of them when `None`), newest first.
    pub fn within(&self, range: Option<&DateRange>) -> Vec<&Conversation> {
        self.conversations
            .iter()
            .filter(|c| range.map_or(true, |r| r.contains(c)))
            .collect()
    }
}

fn sort_newest_first(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| {
        b.metadata
            .start_time_unix_secs
            .cmp(&a.metadata.start_time_unix_secs)
    });
}

fn read_export(path: &Path) -> Result<Vec<Conversation>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::Load {
        source_name: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse_export(&content, &path.display().to_string())
}

fn parse_export(json: &str, source_name: &str) -> Result<Vec<Conversation>> {
    serde_json::from_str(json).map_err(|e| Error::Load {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}
